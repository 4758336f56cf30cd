//! Summary and verification of a body in SSA form.

use std::collections::{BTreeMap, HashMap};

use crate::{
    analysis::cfg::{BlockId, Cfg},
    ir::{LocalId, LocalTable},
    Error, Result,
};

/// Summary of SSA construction over one body.
///
/// The renamed instructions themselves live in the [`Cfg`]; this records what the builder did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SsaForm {
    phi_count: usize,
    pruned: usize,
    versions: BTreeMap<LocalId, u32>,
}

/// Where a version is defined: block and instruction index.
type DefSite = (BlockId, usize);

impl SsaForm {
    pub(crate) fn new(phi_count: usize, pruned: usize, versions: BTreeMap<LocalId, u32>) -> Self {
        SsaForm {
            phi_count,
            pruned,
            versions,
        }
    }

    /// Number of phis left in the body.
    #[must_use]
    pub fn phi_count(&self) -> usize {
        self.phi_count
    }

    /// Number of trivial phis removed.
    #[must_use]
    pub fn pruned(&self) -> usize {
        self.pruned
    }

    /// Number of versions created for `original`, `0` if it was never defined.
    #[must_use]
    pub fn version_count(&self, original: LocalId) -> u32 {
        self.versions.get(&original).copied().unwrap_or(0)
    }

    /// Originals that received versions, with their version counts.
    pub fn versions(&self) -> impl Iterator<Item = (LocalId, u32)> + '_ {
        self.versions.iter().map(|(local, count)| (*local, *count))
    }

    /// Checks the SSA properties of `cfg`.
    ///
    /// - every version is defined exactly once
    /// - every use of a version is dominated by its definition
    /// - a phi operand is checked at the end of its predecessor block, and every phi has one
    ///   operand per distinct predecessor
    ///
    /// Uses of unversioned locals are entry values and always valid.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SsaError`] describing the first violation.
    pub fn verify(&self, cfg: &Cfg, locals: &LocalTable) -> Result<()> {
        let is_version = |local: LocalId| locals.get(local).is_some_and(|l| l.is_version());

        let mut defs: HashMap<LocalId, DefSite> = HashMap::new();
        for block in cfg.blocks() {
            for (index, inst) in block.instructions().iter().enumerate() {
                let Some(def) = inst.def() else {
                    continue;
                };
                if !is_version(def) {
                    return Err(Error::SsaError(format!(
                        "{} in block {} defines unversioned {}",
                        inst.id(),
                        block.id(),
                        locals.display(def)
                    )));
                }
                if defs.insert(def, (block.id(), index)).is_some() {
                    return Err(Error::SsaError(format!(
                        "{} is defined more than once",
                        locals.display(def)
                    )));
                }
            }
        }

        let dominators = cfg.dominators();
        let reaches = |value: LocalId, block: BlockId, index: Option<usize>| -> Result<()> {
            if !is_version(value) {
                return Ok(());
            }
            let Some((def_block, def_index)) = defs.get(&value).copied() else {
                return Err(Error::SsaError(format!(
                    "{} is used in block {block} but never defined",
                    locals.display(value)
                )));
            };
            let dominated = match index {
                Some(index) if def_block == block => def_index < index,
                _ => dominators.dominates(def_block, block),
            };
            if dominated {
                Ok(())
            } else {
                Err(Error::SsaError(format!(
                    "Use of {} in block {block} is not dominated by its definition in {def_block}",
                    locals.display(value)
                )))
            }
        };

        for block in cfg.blocks() {
            for (index, inst) in block.instructions().iter().enumerate() {
                if let Some(phi) = inst.phi() {
                    let expected = block.distinct_predecessors();
                    if phi.operand_count() != expected.len()
                        || !expected.iter().all(|pred| phi.operand_from(*pred).is_some())
                    {
                        return Err(Error::SsaError(format!(
                            "Phi {} in block {} does not match predecessors {:?}",
                            locals.display(phi.result()),
                            block.id(),
                            expected
                        )));
                    }
                    for operand in phi.operands() {
                        reaches(operand.value(), operand.predecessor(), None)?;
                    }
                    continue;
                }
                for used in inst.uses() {
                    reaches(used, block.id(), Some(index))?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::cfg::{BlockFlags, BlockOrigin, CfgDraft},
        ir::{Constant, InstKind, LoweringContext, Operand, Rvalue},
        syntax::SourcePosition,
    };

    fn single_block(ctx: LoweringContext, kinds: Vec<InstKind>) -> (Cfg, LocalTable) {
        let mut draft = CfgDraft::new(ctx, Vec::new());
        let start = draft.add_block(None, BlockFlags::empty(), BlockOrigin::Synthetic);
        draft.start = start;
        for kind in kinds {
            let inst = draft.ctx.instruction(kind, SourcePosition::default());
            draft.block_mut(start).instructions.push(inst);
        }
        let finalized = Cfg::from_draft(draft).expect("finalize");
        (finalized.cfg, finalized.ctx.into_locals())
    }

    fn assign(def: LocalId, value: Operand) -> InstKind {
        InstKind::Assign {
            def,
            value: Rvalue::Use(value),
        }
    }

    #[test]
    fn test_double_definition_rejected() {
        let mut ctx = LoweringContext::new();
        let x = ctx.locals_mut().declare("x");
        let x1 = ctx.locals_mut().version(x, 1);
        let kinds = vec![
            assign(x1, Operand::Const(Constant::Number(1.0))),
            assign(x1, Operand::Const(Constant::Number(2.0))),
        ];
        let (cfg, locals) = single_block(ctx, kinds);
        let err = SsaForm::default().verify(&cfg, &locals);
        assert!(matches!(err, Err(Error::SsaError(_))));
    }

    #[test]
    fn test_use_before_definition_rejected() {
        let mut ctx = LoweringContext::new();
        let x = ctx.locals_mut().declare("x");
        let y = ctx.locals_mut().declare("y");
        let x1 = ctx.locals_mut().version(x, 1);
        let y1 = ctx.locals_mut().version(y, 1);
        let kinds = vec![
            assign(y1, Operand::Local(x1)),
            assign(x1, Operand::Const(Constant::Null)),
            InstKind::Return(Some(Operand::Local(y1))),
        ];
        let (cfg, locals) = single_block(ctx, kinds);
        assert!(SsaForm::default().verify(&cfg, &locals).is_err());
    }

    #[test]
    fn test_entry_values_are_valid() {
        let mut ctx = LoweringContext::new();
        let g = ctx.locals_mut().declare("g");
        let x = ctx.locals_mut().declare("x");
        let x1 = ctx.locals_mut().version(x, 1);
        let kinds = vec![
            assign(x1, Operand::Local(g)),
            InstKind::Return(Some(Operand::Local(x1))),
        ];
        let (cfg, locals) = single_block(ctx, kinds);
        SsaForm::default().verify(&cfg, &locals).expect("valid");
    }

    #[test]
    fn test_versions_summary() {
        let mut versions = BTreeMap::new();
        versions.insert(LocalId::new(3), 2);
        let form = SsaForm::new(1, 0, versions);
        assert_eq!(form.version_count(LocalId::new(3)), 2);
        assert_eq!(form.version_count(LocalId::new(4)), 0);
        assert_eq!(form.versions().count(), 1);
    }
}
