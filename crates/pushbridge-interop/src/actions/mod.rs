// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The action catalogue. Each submodule registers the handlers for one group
// of dot-segmented action names; lifecycle actions are un-namespaced.

pub mod inbox;
pub mod lifecycle;
pub mod messaging;
pub mod profile;
pub mod push;
pub mod user;

use std::sync::Arc;

use pushbridge_core::error::Result;

use crate::dispatch::DispatcherBuilder;
use crate::notification::NotificationDelegateChain;
use crate::traits::NativeSdk;

/// Register every known action on `builder`.
pub fn register_all(
    builder: &mut DispatcherBuilder,
    sdk: Arc<dyn NativeSdk>,
    chain: Arc<NotificationDelegateChain>,
) -> Result<()> {
    lifecycle::register(builder, &sdk, &chain)?;
    push::register(builder, &sdk, &chain)?;
    user::register(builder, &sdk)?;
    profile::register(builder, &sdk)?;
    inbox::register(builder, &sdk)?;
    messaging::register(builder, &sdk)?;
    Ok(())
}
