//! Configuration validation with detailed error reporting.
//!
//! Validates a [`Settings`] tree before it is compiled into a live
//! [`Topology`](crate::models::topology::Topology): structural checks,
//! security warnings, and a few operational recommendations.

use std::collections::HashSet;

use log::{info, warn};

use crate::models::settings::Settings;
use crate::models::topology::ConnectMode;

/// Result of configuration validation containing errors, warnings, and
/// recommendations.
///
/// # Examples
///
/// ```
/// use kairos_rs::config::validation::ValidationResult;
///
/// let mut result = ValidationResult::new();
/// result.add_error("Missing required field".to_string());
/// result.add_warning("Using default value".to_string());
///
/// assert!(!result.is_valid);
/// assert_eq!(result.errors.len(), 1);
/// assert_eq!(result.warnings.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.is_valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn add_recommendation(&mut self, recommendation: String) {
        self.recommendations.push(recommendation);
    }
}

/// Validates a [`Settings`] tree beyond what `Settings::validate` checks on
/// its own: cross-listener conflicts, security posture, and a few
/// operational recommendations.
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate_comprehensive(settings: &Settings) -> ValidationResult {
        let mut result = ValidationResult::new();

        Self::validate_basic_structure(settings, &mut result);
        Self::validate_security(settings, &mut result);
        Self::validate_performance(settings, &mut result);
        Self::validate_bind_conflicts(settings, &mut result);
        Self::validate_connect_modes(settings, &mut result);
        Self::log_validation_results(&result);

        result
    }

    fn validate_basic_structure(settings: &Settings, result: &mut ValidationResult) {
        if settings.listeners.is_empty() {
            result.add_error(
                "no listeners configured - gateway will not accept any connections".to_string(),
            );
        }

        for listener in &settings.listeners {
            if let Err(error) = listener.validate() {
                result.add_error(format!(
                    "listener '{}' validation failed: {error}",
                    listener.name
                ));
            }
            for backend in &listener.backends {
                if let Err(error) = backend.validate() {
                    result.add_error(format!(
                        "backend '{}' on listener '{}' validation failed: {error}",
                        backend.host, listener.name
                    ));
                }
            }
        }
    }

    fn validate_security(settings: &Settings, result: &mut ValidationResult) {
        result.add_warning(
            "upstream TLS certificate verification is disabled unconditionally for all listeners"
                .to_string(),
        );

        for listener in &settings.listeners {
            if matches!(listener.mode, crate::models::topology::ListenMode::Http) {
                result.add_warning(format!(
                    "listener '{}' accepts plaintext HTTP - consider https mode for production",
                    listener.name
                ));
            }
        }
    }

    fn validate_performance(settings: &Settings, result: &mut ValidationResult) {
        for listener in &settings.listeners {
            if listener.backends.len() > 50 {
                result.add_warning(format!(
                    "listener '{}' has a high backend count ({}) - consider splitting traffic across listeners",
                    listener.name,
                    listener.backends.len()
                ));
            }
            for backend in &listener.backends {
                if backend.nodes.len() == 1 {
                    result.add_recommendation(format!(
                        "backend '{}' on listener '{}' has a single node - no failover available",
                        backend.host, listener.name
                    ));
                }
            }
        }
    }

    fn validate_bind_conflicts(settings: &Settings, result: &mut ValidationResult) {
        let mut seen_binds = HashSet::new();
        for listener in &settings.listeners {
            let bind = (listener.bind_ip, listener.port);
            if !seen_binds.insert(bind) {
                result.add_error(format!(
                    "duplicate bind address {}:{} across listeners",
                    listener.bind_ip, listener.port
                ));
            }
        }
    }

    fn validate_connect_modes(settings: &Settings, result: &mut ValidationResult) {
        for listener in &settings.listeners {
            for backend in &listener.backends {
                match backend.connect_mode {
                    ConnectMode::Internal => {
                        if !backend.nodes.is_empty() {
                            result.add_warning(format!(
                                "backend '{}' is internal but declares {} node(s) - nodes are unused",
                                backend.host,
                                backend.nodes.len()
                            ));
                        }
                    }
                    ConnectMode::Https => {
                        if backend.nodes.is_empty() {
                            result.add_error(format!(
                                "backend '{}' uses https connect mode but has no nodes",
                                backend.host
                            ));
                        }
                    }
                    ConnectMode::Http => {}
                }
            }
        }
    }

    fn log_validation_results(result: &ValidationResult) {
        if result.is_valid {
            info!("configuration validation passed");
        } else {
            for error in &result.errors {
                log::error!("validation error: {error}");
            }
        }
        for warning in &result.warnings {
            warn!("validation warning: {warning}");
        }
        for recommendation in &result.recommendations {
            info!("recommendation: {recommendation}");
        }
    }
}
