//! Reachability — mark every type the root composites transitively
//! reference, then drop the rest of the registry.

use std::collections::HashSet;

use tracing::debug;

use crate::model::{Registry, TypeKind};
use crate::{Error, Result};

/// Verify the roots, mark the reachable closure, and drop everything else.
pub fn filter_used(registry: &mut Registry, roots: &[String]) -> Result<()> {
    if roots.is_empty() {
        return Err(Error::NoRoots);
    }
    for root in roots {
        let t = registry
            .lookup(root)
            .ok_or_else(|| Error::UnknownRoot(root.clone()))?;
        if !t.is_composite() {
            return Err(Error::RootNotComposite(root.clone()));
        }
    }

    let mut used = HashSet::new();
    for root in roots {
        mark(registry, root, &mut used)?;
    }

    let (types, aliases) = registry.retain_used(&used);
    debug!(types, aliases, "reachability filter complete");
    Ok(())
}

fn mark(registry: &Registry, name: &str, used: &mut HashSet<String>) -> Result<()> {
    if !used.insert(name.to_string()) {
        return Ok(());
    }

    if let Some(t) = registry.get_type(name) {
        match &t.kind {
            TypeKind::Native => {}
            TypeKind::Decorated { base_type, decor } => {
                if decor.ptr_level > 1 {
                    return Err(Error::PtrLevel {
                        type_name: name.to_string(),
                        level: decor.ptr_level,
                    });
                }
                mark(registry, base_type, used)?;
            }
            TypeKind::Composite { members } => {
                for m in members {
                    if m.decor.ptr_level > 1 {
                        return Err(Error::PtrLevel {
                            type_name: format!("{}.{}", t.name, m.name),
                            level: m.decor.ptr_level,
                        });
                    }
                    mark(registry, &m.base_type, used)?;
                }
            }
        }
        return Ok(());
    }

    if let Some(a) = registry.get_alias(name) {
        let target = a.actual_name.clone();
        return mark(registry, &target, used);
    }

    Err(Error::Internal(format!("failed to mark '{name}' as used")))
}
