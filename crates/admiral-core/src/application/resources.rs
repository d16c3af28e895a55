//! Task resource defaults and limit checks.
//!
//! Quantities use the Kubernetes suffixes `m`, `k`, `Ki`, `M`, `Mi`, `G`,
//! `Gi`, `T` and `Ti`.

use crate::config::{TaskResourceConfig, TaskResourceSet};
use crate::domain::workflow::{CompiledTask, ResourceEntry, ResourceName};
use crate::error::CoreError;

const SUFFIXES: [(&str, f64); 9] = [
    ("Ki", 1024.0),
    ("Mi", 1024.0 * 1024.0),
    ("Gi", 1024.0 * 1024.0 * 1024.0),
    ("Ti", 1024.0 * 1024.0 * 1024.0 * 1024.0),
    ("m", 0.001),
    ("k", 1e3),
    ("M", 1e6),
    ("G", 1e9),
    ("T", 1e12),
];

/// Parse a quantity string into its base unit
pub fn parse_quantity(quantity: &str) -> Result<f64, CoreError> {
    let quantity = quantity.trim();
    let (number, multiplier) = SUFFIXES
        .iter()
        .find_map(|(suffix, multiplier)| quantity.strip_suffix(suffix).map(|n| (n, *multiplier)))
        .unwrap_or((quantity, 1.0));
    number
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
        .map(|value| value * multiplier)
        .ok_or_else(|| CoreError::ValidationError(format!("invalid resource quantity [{}]", quantity)))
}

fn configured(set: &TaskResourceSet, name: ResourceName) -> &str {
    match name {
        ResourceName::Cpu => &set.cpu,
        ResourceName::Memory => &set.memory,
        ResourceName::Gpu => &set.gpu,
        ResourceName::Storage => &set.storage,
    }
}

/// Fill unset requests from the platform defaults. A missing limit takes the request.
pub fn set_defaults(config: &TaskResourceConfig, task: &mut CompiledTask) {
    let Some(container) = task.template.container_mut() else {
        return;
    };
    let resources = &mut container.resources;
    for name in ResourceName::ALL {
        if resources.request(name).is_none() {
            let default = configured(&config.defaults, name);
            if !default.is_empty() {
                resources.requests.push(ResourceEntry {
                    name,
                    value: default.to_string(),
                });
            }
        }
        if resources.limit(name).is_none() {
            if let Some(request) = resources.request(name).map(str::to_string) {
                resources.limits.push(ResourceEntry { name, value: request });
            }
        }
    }
}

/// Requests must not exceed the platform limits
pub fn validate_task_resources(config: &TaskResourceConfig, task: &CompiledTask) -> Result<(), CoreError> {
    let Some(container) = task.template.container() else {
        return Ok(());
    };
    for entry in &container.resources.requests {
        let requested = parse_quantity(&entry.value)?;
        let ceiling = configured(&config.limits, entry.name);
        if ceiling.is_empty() {
            continue;
        }
        if requested > parse_quantity(ceiling)? {
            return Err(CoreError::ValidationError(format!(
                "task [{}] requested {:?} [{}] exceeds the limit [{}]",
                task.template.id.name, entry.name, entry.value, ceiling
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::{Container, Resources, TaskTarget, TaskTemplate};

    fn container_task(requests: Vec<ResourceEntry>) -> CompiledTask {
        CompiledTask {
            template: TaskTemplate {
                target: Some(TaskTarget::Container(Container {
                    image: "img".to_string(),
                    resources: Resources {
                        requests,
                        limits: vec![],
                    },
                    ..Default::default()
                })),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("500m").unwrap(), 0.5);
        assert_eq!(parse_quantity("2").unwrap(), 2.0);
        assert_eq!(parse_quantity("1Ki").unwrap(), 1024.0);
        assert_eq!(parse_quantity("1Gi").unwrap(), 1073741824.0);
        assert_eq!(parse_quantity("3M").unwrap(), 3e6);
        assert!(parse_quantity("lots").is_err());
        assert!(parse_quantity("").is_err());
    }

    #[test]
    fn test_defaults_fill_missing_requests_and_limits() {
        let mut task = container_task(vec![ResourceEntry {
            name: ResourceName::Cpu,
            value: "1".to_string(),
        }]);
        set_defaults(&TaskResourceConfig::default(), &mut task);

        let resources = &task.template.container().unwrap().resources;
        assert_eq!(resources.request(ResourceName::Cpu), Some("1"));
        assert_eq!(resources.request(ResourceName::Memory), Some("200Mi"));
        assert_eq!(resources.request(ResourceName::Gpu), None);
        assert_eq!(resources.limit(ResourceName::Cpu), Some("1"));
        assert_eq!(resources.limit(ResourceName::Memory), Some("200Mi"));
    }

    #[test]
    fn test_request_over_limit_rejected() {
        let task = container_task(vec![ResourceEntry {
            name: ResourceName::Memory,
            value: "2Gi".to_string(),
        }]);
        assert!(validate_task_resources(&TaskResourceConfig::default(), &task).is_err());

        let ok = container_task(vec![ResourceEntry {
            name: ResourceName::Memory,
            value: "512Mi".to_string(),
        }]);
        assert!(validate_task_resources(&TaskResourceConfig::default(), &ok).is_ok());
    }

    #[test]
    fn test_non_container_tasks_untouched() {
        let mut task = CompiledTask::default();
        set_defaults(&TaskResourceConfig::default(), &mut task);
        assert_eq!(task, CompiledTask::default());
        assert!(validate_task_resources(&TaskResourceConfig::default(), &task).is_ok());
    }
}
