mod dead_letter;
mod fan_out;
mod worker;

pub use dead_letter::{AddToDlq, DeadLetter, DeadLetterActor, DlqStats, GetDeadLetters, GetDlqStats};
pub use fan_out::{BroadcastReport, ClaimPublication, DispatchError, DispatchReport, DispatchService};
