// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SDK configuration, start-up and privacy switches.

use std::sync::Arc;

use pushbridge_core::error::Result;
use pushbridge_core::types::SdkConfig;
use tracing::info;

use crate::dispatch::{ActionContext, ActionResult, DispatcherBuilder};
use crate::notification::NotificationDelegateChain;
use crate::params::Parameters;
use crate::traits::{CoreSdk, NativeSdk};

pub const SET_CONFIG: &str = "setConfig";
pub const START: &str = "start";
pub const OPT_IN: &str = "optIn";
pub const OPT_OUT: &str = "optOut";
pub const OPT_OUT_AND_WIPE_DATA: &str = "optOutAndWipeData";

pub(crate) fn register(
    builder: &mut DispatcherBuilder,
    sdk: &Arc<dyn NativeSdk>,
    chain: &Arc<NotificationDelegateChain>,
) -> Result<()> {
    let s = Arc::clone(sdk);
    builder.register(SET_CONFIG, move |p: &Parameters, _: &ActionContext| {
        s.set_config(SdkConfig {
            api_key: p.required("APIKey")?,
            use_advertising_id: p.optional("useIDFA"),
        })?;
        Ok(ActionResult::Ack)
    })?;

    let s = Arc::clone(sdk);
    let c = Arc::clone(chain);
    builder.register(START, move |_: &Parameters, _: &ActionContext| {
        s.start()?;
        info!(platform = s.platform_name(), "SDK started");
        c.mark_ready();
        Ok(ActionResult::Ack)
    })?;

    let s = Arc::clone(sdk);
    builder.register(OPT_IN, move |_: &Parameters, _: &ActionContext| {
        s.opt_in()?;
        Ok(ActionResult::Ack)
    })?;

    let s = Arc::clone(sdk);
    builder.register(OPT_OUT, move |_: &Parameters, _: &ActionContext| {
        s.opt_out(false)?;
        Ok(ActionResult::Ack)
    })?;

    let s = Arc::clone(sdk);
    builder.register(OPT_OUT_AND_WIPE_DATA, move |_: &Parameters, _: &ActionContext| {
        s.opt_out(true)?;
        Ok(ActionResult::Ack)
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::Harness;
    use serde_json::{Value, json};

    #[test]
    fn set_config_then_start_marks_chain_ready() {
        let h = Harness::new();
        h.call(SET_CONFIG, json!({ "APIKey": "key", "useIDFA": true })).expect("config");
        assert!(!h.chain.is_ready());

        assert_eq!(h.call(START, json!({})), Ok(Value::Null));
        assert!(h.chain.is_ready());

        let state = h.sdk.state();
        assert!(state.started);
        assert_eq!(state.config.as_ref().map(|c| c.use_advertising_id), Some(Some(true)));
    }

    #[test]
    fn set_config_requires_api_key() {
        let h = Harness::new();
        let err = h.call(SET_CONFIG, json!({})).expect_err("missing key");
        assert_eq!(err.kind(), "InvalidParameters");
        assert_eq!(h.events()[0].0, "onBridgeFailure");
    }

    #[test]
    fn opt_out_and_wipe_clears_user_data() {
        let h = Harness::new();
        h.call("user.edit", json!({ "operations": [
            { "operation": "ADD_TAG", "collection": "c", "tag": "t" }
        ]}))
        .expect("edit");
        h.call(OPT_OUT_AND_WIPE_DATA, Value::Null).expect("wipe");

        let state = h.sdk.state();
        assert!(state.opted_out);
        assert!(state.tags.is_empty());
        drop(state);

        h.call(OPT_IN, Value::Null).expect("opt in");
        assert!(!h.sdk.state().opted_out);
    }
}
