//! 配置校验模块
//!
//! 校验规则：
//! - 字段级约束 (`validator` derive)：subscription_id 非空、间隔 >= 1
//! - firehose.url 使用 ws/wss scheme
//! - min_retry_delay_ms <= max_retry_delay_ms (两者都设置时)
//! - metrics.namespace 是合法的 Prometheus 指标名前缀
//! - metrics.environment 不含控制字符

use contracts::{ContractError, ExporterBlueprint};
use validator::Validate;

/// 校验 ExporterBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &ExporterBlueprint) -> Result<(), ContractError> {
    blueprint
        .validate()
        .map_err(|e| ContractError::config_validation("blueprint", e.to_string()))?;

    validate_url(blueprint)?;
    validate_retry_delays(blueprint)?;
    validate_namespace(blueprint)?;
    validate_environment(blueprint)?;
    Ok(())
}

/// 校验 firehose URL scheme
fn validate_url(blueprint: &ExporterBlueprint) -> Result<(), ContractError> {
    let url = &blueprint.firehose.url;
    let scheme = url.split_once("://").map(|(scheme, _)| scheme);

    match scheme {
        Some("ws") | Some("wss") => Ok(()),
        _ => Err(ContractError::config_validation(
            "firehose.url",
            format!("url must start with ws:// or wss://, got '{url}'"),
        )),
    }
}

/// 校验重试延迟范围
fn validate_retry_delays(blueprint: &ExporterBlueprint) -> Result<(), ContractError> {
    let firehose = &blueprint.firehose;
    if let (Some(min), Some(max)) = (firehose.min_retry_delay(), firehose.max_retry_delay()) {
        if min > max {
            return Err(ContractError::config_validation(
                "firehose.min_retry_delay_ms / firehose.max_retry_delay_ms",
                format!(
                    "min_retry_delay_ms ({}) must be <= max_retry_delay_ms ({})",
                    firehose.min_retry_delay_ms, firehose.max_retry_delay_ms
                ),
            ));
        }
    }
    Ok(())
}

/// 校验指标命名空间
fn validate_namespace(blueprint: &ExporterBlueprint) -> Result<(), ContractError> {
    let namespace = &blueprint.metrics.namespace;
    if !is_metric_name(namespace) {
        return Err(ContractError::config_validation(
            "metrics.namespace",
            format!("'{namespace}' is not a valid metric name prefix"),
        ));
    }
    Ok(())
}

/// 校验 environment 标签值
fn validate_environment(blueprint: &ExporterBlueprint) -> Result<(), ContractError> {
    if blueprint.metrics.environment.chars().any(char::is_control) {
        return Err(ContractError::config_validation(
            "metrics.environment",
            "environment label must not contain control characters",
        ));
    }
    Ok(())
}

/// `[a-zA-Z_:][a-zA-Z0-9_:]*`
fn is_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}
