pub mod flow;
pub mod session;
pub mod store;

pub use flow::{OrderWizard, StepOutcome, WizardAction};
pub use session::{SessionKey, WizardSession, WizardStep};
pub use store::{MemorySessionStore, SessionStore};
