//! Parameter registry - owns every tracked parameter
//!
//! All mutation goes through the registry; there is no ambient state.
//! Inbound tags are routed through an explicit tag → parameter table.

use std::collections::HashMap;

use super::parameter::{ParamId, Parameter};
use crate::cat::CatCommand;
use crate::config::ParametersConfig;

/// The set of parameters kept in sync with the device
#[derive(Debug, Clone)]
pub struct ParameterRegistry {
    params: HashMap<ParamId, Parameter>,
    routes: HashMap<&'static str, ParamId>,
}

impl ParameterRegistry {
    /// Build the registry with start-up values from configuration
    pub fn new(config: &ParametersConfig) -> Self {
        let mut params = HashMap::new();
        let mut routes = HashMap::new();

        for id in ParamId::ALL {
            params.insert(id, Parameter::new(id, config.default_for(id)));
            routes.insert(id.tag(), id);
        }

        Self { params, routes }
    }

    /// Route a wire tag to its parameter
    pub fn route(&self, tag: &str) -> Option<ParamId> {
        self.routes.get(tag).copied()
    }

    pub fn get(&self, id: ParamId) -> &Parameter {
        // Every ParamId is inserted at construction
        &self.params[&id]
    }

    pub fn get_mut(&mut self, id: ParamId) -> &mut Parameter {
        self.params
            .get_mut(&id)
            .unwrap_or_else(|| unreachable!("parameter {id} registered at construction"))
    }

    /// Read-requests for every parameter, in fixed resync order
    pub fn read_requests(&self) -> Vec<CatCommand> {
        ParamId::ALL
            .iter()
            .map(|id| self.get(*id).read_request())
            .collect()
    }

    /// Parameters that still have an unresolved delta
    pub fn pending(&self) -> Vec<ParamId> {
        ParamId::ALL
            .into_iter()
            .filter(|id| self.get(*id).pending() != 0)
            .collect()
    }
}

impl Default for ParameterRegistry {
    fn default() -> Self {
        Self::new(&ParametersConfig::default())
    }
}
