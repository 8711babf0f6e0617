//! Tool-side LTI 1.3 security core: OIDC login initiation, platform id_token verification
//! against rotating JWKS keys, and signed Deep Linking responses behind one orchestrator.
//!
//! The HTTP layer calls [`flows::LtiTool`] once per protocol step (`login`, `launch`,
//! `deep_link_select`, `return_deep_link`). Every step either yields a value the caller can
//! redirect with or a typed [`Error`] that must deny the request.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod claims;
pub mod config;
pub mod error;
pub mod flows;
pub mod http;
pub mod issuer;
pub mod jwks;
pub mod keys;
pub mod obs;
pub mod secret;
pub mod session;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, HashSet},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use error::{Error, FailureKind, Result};
pub use flows::LtiTool;
pub use jsonwebtoken;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use httpmock as _;
