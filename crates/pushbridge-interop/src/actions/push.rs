// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `push.*` actions.

use std::sync::Arc;

use pushbridge_core::error::{BridgeError, Result};
use pushbridge_core::types::PushPlatform;
use serde_json::Value;

use crate::dispatch::{ActionContext, ActionResult, DispatcherBuilder};
use crate::notification::NotificationDelegateChain;
use crate::params::Parameters;
use crate::traits::{NativeSdk, PushSdk};

pub const GET_LAST_KNOWN_PUSH_TOKEN: &str = "push.getLastKnownPushToken";
pub const REGISTER: &str = "push.register";
pub const REFRESH_TOKEN: &str = "push.refreshToken";
pub const REQUEST_AUTHORIZATION: &str = "push.requestAuthorization";
pub const REQUEST_PROVISIONAL_AUTHORIZATION: &str = "push.requestProvisionalAuthorization";
pub const CLEAR_BADGE: &str = "push.clearBadge";
pub const DISMISS_NOTIFICATIONS: &str = "push.dismissNotifications";
pub const SET_IOS_NOTIF_TYPES: &str = "push.setIOSNotifTypes";
pub const SET_ANDROID_NOTIF_TYPES: &str = "push.setAndroidNotifTypes";
pub const SET_IOS_SHOW_FOREGROUND_NOTIFICATIONS: &str = "push.setIOSShowForegroundNotifications";

/// Register an action that only calls into the SDK.
fn simple(
    builder: &mut DispatcherBuilder,
    sdk: &Arc<dyn NativeSdk>,
    action: &str,
    run: fn(&dyn NativeSdk) -> Result<()>,
) -> Result<()> {
    let s = Arc::clone(sdk);
    builder.register(action, move |_: &Parameters, _: &ActionContext| {
        run(s.as_ref())?;
        Ok(ActionResult::Ack)
    })?;
    Ok(())
}

fn notification_types(p: &Parameters) -> Result<u32> {
    let raw: i64 = p.required("notifTypes")?;
    u32::try_from(raw).map_err(|_| {
        BridgeError::invalid_parameter(format!("notifTypes out of range: {raw}"))
    })
}

pub(crate) fn register(
    builder: &mut DispatcherBuilder,
    sdk: &Arc<dyn NativeSdk>,
    chain: &Arc<NotificationDelegateChain>,
) -> Result<()> {
    let s = Arc::clone(sdk);
    builder.register(GET_LAST_KNOWN_PUSH_TOKEN, move |_: &Parameters, _: &ActionContext| {
        Ok(ActionResult::Value(Value::String(
            s.last_known_push_token().unwrap_or_default(),
        )))
    })?;

    simple(builder, sdk, REGISTER, |s| s.register_for_remote_notifications())?;
    simple(builder, sdk, REFRESH_TOKEN, |s| s.refresh_token())?;
    simple(builder, sdk, REQUEST_AUTHORIZATION, |s| s.request_authorization(false))?;
    simple(builder, sdk, REQUEST_PROVISIONAL_AUTHORIZATION, |s| {
        s.request_authorization(true)
    })?;
    simple(builder, sdk, CLEAR_BADGE, |s| s.clear_badge())?;
    simple(builder, sdk, DISMISS_NOTIFICATIONS, |s| s.dismiss_notifications())?;

    for (action, platform) in [
        (SET_IOS_NOTIF_TYPES, PushPlatform::Ios),
        (SET_ANDROID_NOTIF_TYPES, PushPlatform::Android),
    ] {
        let s = Arc::clone(sdk);
        builder.register(action, move |p: &Parameters, _: &ActionContext| {
            s.set_notification_types(platform, notification_types(p)?)?;
            Ok(ActionResult::Ack)
        })?;
    }

    let c = Arc::clone(chain);
    builder.register(
        SET_IOS_SHOW_FOREGROUND_NOTIFICATIONS,
        move |p: &Parameters, _: &ActionContext| {
            c.set_show_foreground_notifications(p.required("showForeground")?);
            c.set_force_own_completion_response(true);
            Ok(ActionResult::Ack)
        },
    )?;

    Ok(())
}
