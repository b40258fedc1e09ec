// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! Pushbridge interop: the bridge between a scripting layer and a native push
//! SDK.
//!
//! Scripts invoke named actions with JSON parameters through
//! [`ActionDispatcher`] and receive a promise for the result. Older bridges
//! that can only forward strings use the legacy contract in [`legacy`]. The
//! [`notification`] module chains the bridge into the host's single
//! notification delegate slot without displacing whoever held it.

pub mod actions;
pub mod dispatch;
pub mod legacy;
pub mod notification;
pub mod params;
pub mod promise;
pub mod stub;
pub mod traits;

use std::sync::Arc;

use pushbridge_core::error::Result;

pub use dispatch::{ActionContext, ActionDispatcher, ActionResult, BridgeCallback, DispatcherBuilder};
pub use legacy::{LegacyPromise, StructuredPromise};
pub use notification::NotificationDelegateChain;
pub use params::Parameters;
pub use promise::SimplePromise;

/// The SDK implementation available on this host.
///
/// Only the in-memory SDK ships with the crate; native platforms provide
/// their own `NativeSdk` and call [`bridge`] directly.
pub fn platform_sdk() -> Arc<dyn traits::NativeSdk> {
    Arc::new(stub::StubSdk::new())
}

/// Build a dispatcher with the full action catalogue wired to `sdk` and
/// `chain`.
pub fn bridge(
    sdk: Arc<dyn traits::NativeSdk>,
    chain: Arc<NotificationDelegateChain>,
) -> Result<ActionDispatcher> {
    let mut builder = ActionDispatcher::builder();
    actions::register_all(&mut builder, sdk, chain)?;
    Ok(builder.build())
}
