use std::collections::HashSet;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{DomainError, DomainResult};

/// Declarative resource tree provisioned against the CSE at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionPlan {
    pub ae: AeSpec,
    #[serde(default)]
    pub tree: Vec<ContainerSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AeSpec {
    pub rn: String,
    pub api: String,
    pub rr: Option<bool>,
    pub poa: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContainerSpec {
    pub rn: String,
    pub lbl: Option<Vec<String>>,
    pub mni: Option<u32>,
    pub mia: Option<u32>,
    #[serde(default)]
    pub cnt: Vec<ContainerSpec>,
    #[serde(default)]
    pub subs: Vec<SubscriptionSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionSpec {
    pub rn: String,
    pub enc: Option<Value>,
    pub nu: Option<Vec<String>>,
    pub nct: Option<u8>,
}

impl ProvisionPlan {
    pub fn from_yaml_str(raw: &str) -> DomainResult<Self> {
        let plan: ProvisionPlan = serde_yaml::from_str(raw)
            .map_err(|e| DomainError::InvalidPlan(format!("YAML parse failed: {}", e)))?;
        plan.validate()?;
        Ok(plan)
    }

    /// Checks the plan invariants: non-empty AE name, sibling container
    /// names unique per parent, notification-target lists non-empty
    /// whenever notifications are configured.
    pub fn validate(&self) -> DomainResult<()> {
        if self.ae.rn.trim().is_empty() {
            return Err(DomainError::InvalidPlan("AE rn must not be empty".into()));
        }
        validate_siblings(&self.tree, &self.ae.rn)
    }
}

fn validate_siblings(containers: &[ContainerSpec], parent: &str) -> DomainResult<()> {
    let mut seen = HashSet::new();
    for cnt in containers {
        if cnt.rn.trim().is_empty() {
            return Err(DomainError::InvalidPlan(format!(
                "Container under '{}' has an empty rn",
                parent
            )));
        }
        if !seen.insert(cnt.rn.as_str()) {
            return Err(DomainError::InvalidPlan(format!(
                "Duplicate container rn '{}' under '{}'",
                cnt.rn, parent
            )));
        }
        for sub in &cnt.subs {
            sub.validate(&cnt.rn)?;
        }
        validate_siblings(&cnt.cnt, &cnt.rn)?;
    }
    Ok(())
}

impl SubscriptionSpec {
    fn validate(&self, container: &str) -> DomainResult<()> {
        let has_targets = self.nu.as_ref().is_some_and(|nu| !nu.is_empty());
        let configures_notifications =
            self.enc.is_some() || self.nct.is_some() || self.nu.is_some();
        if configures_notifications && !has_targets {
            return Err(DomainError::InvalidPlan(format!(
                "Subscription '{}' under '{}' configures notifications without targets",
                self.rn, container
            )));
        }
        Ok(())
    }
}

impl AeSpec {
    /// Wire body for an AE create (`m2m:ae`, ty=2). `rr` defaults to true
    /// and `poa` to an empty list, matching what the CSE expects.
    pub fn resource_body(&self) -> Value {
        serde_json::json!({
            "m2m:ae": {
                "rn": self.rn,
                "api": self.api,
                "rr": self.rr.unwrap_or(true),
                "poa": self.poa.clone().unwrap_or_default(),
            }
        })
    }
}

impl ContainerSpec {
    /// Wire body for a container create (`m2m:cnt`, ty=3). Optional
    /// attributes are omitted entirely when unset.
    pub fn resource_body(&self) -> Value {
        let mut cnt = Map::new();
        cnt.insert("rn".to_string(), Value::from(self.rn.clone()));
        if let Some(lbl) = &self.lbl {
            cnt.insert("lbl".to_string(), Value::from(lbl.clone()));
        }
        if let Some(mni) = self.mni {
            cnt.insert("mni".to_string(), Value::from(mni));
        }
        if let Some(mia) = self.mia {
            cnt.insert("mia".to_string(), Value::from(mia));
        }
        serde_json::json!({ "m2m:cnt": cnt })
    }
}

impl SubscriptionSpec {
    /// Wire body for a subscription create (`m2m:sub`, ty=23).
    pub fn resource_body(&self) -> Value {
        let mut sub = Map::new();
        sub.insert("rn".to_string(), Value::from(self.rn.clone()));
        if let Some(enc) = &self.enc {
            sub.insert("enc".to_string(), enc.clone());
        }
        if let Some(nu) = &self.nu {
            sub.insert("nu".to_string(), Value::from(nu.clone()));
        }
        if let Some(nct) = self.nct {
            sub.insert("nct".to_string(), Value::from(nct));
        }
        serde_json::json!({ "m2m:sub": sub })
    }
}
