//! Stock kernels.

mod birth;
mod birth_kill;
mod death;
mod exchange;
mod initial;
mod merge;
mod replace;
mod split;

pub use birth::BirthKernel;
pub use birth_kill::BirthAndKillKernel;
pub use death::DeathKernel;
pub use exchange::ExchangeKernel;
pub use initial::InitialCfgKernel;
pub use merge::MergeKernel;
pub use replace::ReplaceKernel;
pub use split::SplitKernel;
