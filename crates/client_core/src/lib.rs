//! Client side of the menu service: HTTP access to the server and the per-item
//! action state that a front end renders.
pub mod controller;
pub mod error;
pub mod remote;
pub mod session;

pub use controller::{MenuController, SessionEvent};
pub use error::{ExtractionError, ServiceError};
pub use remote::{HttpMenuBackend, MenuBackend, MenuUpload};
pub use session::{
    ActionState, Completion, ExtractionStatus, Generation, ItemView, MenuSession, MenuView,
};
pub use shared::domain::{ActionKind, MenuItem};
