//! External interfaces consumed by the session module.
//!
//! The session reducer and the blog services depend on these traits only.
//! Production code plugs in the Firebase backends from [`crate::stores`];
//! tests plug in the in-memory [`crate::mocks`].
//!
//! ```text
//! ┌──────────────────┐   auth_state()    ┌──────────────────┐
//! │ IdentityProvider │ ────────────────▶ │ SessionListener  │
//! └──────────────────┘                   └────────┬─────────┘
//!          ▲ sign_out()                           │ set_identity / clear
//!          │                                      ▼ fetch_profile
//! ┌────────┴─────────┐   get_document()  ┌──────────────────┐
//! │ SessionReducer   │ ────────────────▶ │ DocumentDatabase │
//! └────────┬─────────┘                   └──────────────────┘
//!          │ state_changed()
//!          ▼
//! ┌──────────────────┐
//! │ LocalStorage     │  "auth-storage"
//! └──────────────────┘
//! ```

pub mod database;
pub mod identity;
pub mod local_storage;

pub use database::{Direction, DocumentDatabase, DocumentUpdate, FieldTransform, Query};
pub use identity::IdentityProvider;
pub use local_storage::LocalStorage;
