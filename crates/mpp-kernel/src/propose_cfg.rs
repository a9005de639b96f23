use std::fmt;

use mpp_core::MppError;
use mpp_mark::{Cfg, CfgGen, VoxelizedMarkMemo};

use crate::context::ProposerContext;
use crate::propose_mark::MarkProposer;

/// Produces a whole configuration from nothing.
pub trait ConfigurationProposer: fmt::Debug + Send + Sync {
    /// Proposes a configuration; `Ok(None)` means the proposer failed to
    /// produce one.
    fn propose(
        &self,
        cfg_gen: &mut CfgGen,
        ctx: &mut ProposerContext<'_>,
    ) -> Result<Option<Cfg>, MppError>;
}

/// Instantiates `count` templates and places each with a mark proposer.
///
/// Templates the mark proposer refuses are skipped. The proposal fails only
/// when marks were requested and none could be placed.
#[derive(Debug)]
pub struct UniformCfgProposer {
    count: usize,
    marks: Box<dyn MarkProposer>,
}

impl UniformCfgProposer {
    /// Creates the proposer.
    pub fn new(count: usize, marks: Box<dyn MarkProposer>) -> Self {
        Self { count, marks }
    }
}

impl ConfigurationProposer for UniformCfgProposer {
    fn propose(
        &self,
        cfg_gen: &mut CfgGen,
        ctx: &mut ProposerContext<'_>,
    ) -> Result<Option<Cfg>, MppError> {
        let mut cfg = Cfg::new();
        for _ in 0..self.count {
            let mut memo = VoxelizedMarkMemo::new(cfg_gen.new_template());
            if self.marks.propose(&mut memo, &mut ctx.reborrow())? {
                cfg.push(memo.shared_mark().clone())?;
            }
        }
        if self.count > 0 && cfg.is_empty() {
            ctx.errors.add(format!("none of {} initial marks could be placed", self.count));
            return Ok(None);
        }
        Ok(Some(cfg))
    }
}
