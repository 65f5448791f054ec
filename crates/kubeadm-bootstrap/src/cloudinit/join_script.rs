//! Retrying join script.

use handlebars::Handlebars;
use serde::Serialize;

use super::{BaseUserData, KUBEADM_JOIN_CONFIG_PATH};
use crate::error::RenderError;

const JOIN_SCRIPT_TEMPLATE: &str = include_str!("../../templates/kubeadm-bootstrap-script.sh.hbs");

const MAX_ATTEMPTS: u32 = 5;
const RETRY_INTERVAL_SECS: u64 = 15;

#[derive(Debug, Serialize)]
struct ScriptContext<'a> {
    config_path: &'a str,
    verbosity: &'a str,
    control_plane: bool,
    max_attempts: u32,
    retry_interval_secs: u64,
}

/// Render the join script for `input`.
pub(super) fn render(input: &BaseUserData) -> Result<String, RenderError> {
    render_template(JOIN_SCRIPT_TEMPLATE, input)
}

fn render_template(template: &str, input: &BaseUserData) -> Result<String, RenderError> {
    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(true);
    handlebars.register_escape_fn(handlebars::no_escape);

    let context = ScriptContext {
        config_path: KUBEADM_JOIN_CONFIG_PATH,
        verbosity: &input.kubeadm_verbosity,
        control_plane: input.control_plane,
        max_attempts: MAX_ATTEMPTS,
        retry_interval_secs: RETRY_INTERVAL_SECS,
    };
    Ok(handlebars.render_template(template, &context)?)
}
