use crate::aig::{AigKind, AigManager, AigRef};
use crate::error::{Error, Result};
use std::collections::HashMap;

/// Owning association between gates of two managers. Signs are stored on
/// the base gate and re-applied on lookup; constants map to themselves.
#[derive(Debug, Default)]
pub struct AigMap {
    table: HashMap<AigRef, AigRef>,
}

impl AigMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn contains(&self, src: AigRef) -> bool {
        src.is_const() || self.table.contains_key(&src.base())
    }

    pub fn insert(
        &mut self,
        src_mgr: &mut AigManager,
        dst_mgr: &mut AigManager,
        src: AigRef,
        dst: AigRef,
    ) -> Result<()> {
        if self.contains(src) {
            return Err(Error::AigAlreadyMapped(src.index()));
        }
        src_mgr.get(src)?;
        if !dst.is_const() {
            dst_mgr.get(dst)?;
        }
        src_mgr.copy(src)?;
        dst_mgr.copy(dst)?;
        self.table
            .insert(src.base(), dst.invert_if(src.is_inverted()));
        Ok(())
    }

    pub fn get(&self, src: AigRef) -> Option<AigRef> {
        if src.is_const() {
            return Some(src);
        }
        self.table
            .get(&src.base())
            .map(|dst| dst.invert_if(src.is_inverted()))
    }

    pub fn delete(self, src_mgr: &mut AigManager, dst_mgr: &mut AigManager) -> Result<()> {
        for (src, dst) in self.table {
            src_mgr.release(src)?;
            dst_mgr.release(dst)?;
        }
        Ok(())
    }
}

/// Copies the cones of `roots` from `src` into `dst`. Every copied gate is
/// recorded in `map`; variables become fresh variables of `dst`.
pub fn clone_cones(
    src: &mut AigManager,
    dst: &mut AigManager,
    map: &mut AigMap,
    roots: &[AigRef],
) -> Result<()> {
    let mut stack: Vec<(AigRef, bool)> = roots.iter().map(|r| (r.base(), false)).collect();
    while let Some((a, expanded)) = stack.pop() {
        if map.contains(a) {
            continue;
        }
        let image = match src.get(a)?.get_kind() {
            AigKind::Var => dst.new_var(),
            AigKind::And(l, r) if expanded => {
                let (l, r) = match (map.get(l), map.get(r)) {
                    (Some(l), Some(r)) => (l, r),
                    _ => return Err(Error::Internal(format!("operands of {} are not cloned", a))),
                };
                dst.and(l, r)?
            }
            AigKind::And(l, r) => {
                stack.push((a, true));
                stack.push((r.base(), false));
                stack.push((l.base(), false));
                continue;
            }
        };
        map.insert(src, dst, a, image)?;
        dst.release(image)?;
    }
    Ok(())
}
