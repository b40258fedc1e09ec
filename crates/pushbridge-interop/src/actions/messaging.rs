// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `messaging.*` actions.

use std::sync::Arc;

use pushbridge_core::error::Result;
use pushbridge_core::types::CallbackEvent;
use serde_json::json;
use tracing::debug;

use crate::dispatch::{ActionContext, ActionResult, DispatcherBuilder};
use crate::params::Parameters;
use crate::traits::{MessagingSdk, NativeSdk};

pub const SET_DO_NOT_DISTURB_ENABLED: &str = "messaging.setDoNotDisturbEnabled";
pub const SHOW_PENDING_MESSAGE: &str = "messaging.showPendingMessage";

pub(crate) fn register(builder: &mut DispatcherBuilder, sdk: &Arc<dyn NativeSdk>) -> Result<()> {
    let s = Arc::clone(sdk);
    builder.register(SET_DO_NOT_DISTURB_ENABLED, move |p: &Parameters, _: &ActionContext| {
        s.set_do_not_disturb(p.required("enabled")?)?;
        Ok(ActionResult::Ack)
    })?;

    let s = Arc::clone(sdk);
    builder.register(SHOW_PENDING_MESSAGE, move |_: &Parameters, ctx: &ActionContext| {
        match s.show_pending_message()? {
            Some(message) => ctx.emit(
                CallbackEvent::DispatchMessagingEvent,
                json!({
                    "lifecycleEvent": "shown",
                    "messageIdentifier": message.identifier,
                }),
            ),
            None => debug!("no pending in-app message"),
        }
        Ok(ActionResult::Ack)
    })?;

    Ok(())
}
