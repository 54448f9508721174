mod account;
mod clock;
mod ids;
mod ledger;
mod money;
mod schedule;
mod timestamp;

pub use account::*;
pub use clock::*;
pub use ids::*;
pub use ledger::*;
pub use money::*;
pub use schedule::*;
pub use timestamp::*;
