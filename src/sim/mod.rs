//! In-process execution of Rivet networks.
//!
//! The simulator runs a validated program directly, with the same runtime
//! primitives the generated Rust uses ([`Topic`](crate::runtime::Topic),
//! [`ModeBus`](crate::runtime::ModeBus), [`ModeQueue`](crate::runtime::ModeQueue)),
//! and records every step as a [`TraceEvent`]. Output lines match what the
//! compiled program prints for the same inputs.
//!
//! # Usage
//!
//! ```ignore
//! use rivet::sim::Simulation;
//!
//! let sim = Simulation::new(&program)?;
//! sim.boot();
//! sim.request_system_mode("Active")?;
//! for line in sim.trace().output_lines() {
//!     println!("{}", line);
//! }
//! ```

mod interp;
pub mod trace;
pub mod value;

use std::rc::Rc;

use thiserror::Error;

use crate::parser::Program;
use crate::plan::PlanError;

use interp::World;

pub use interp::MAX_DEPTH;
pub use trace::{Trace, TraceEvent, TraceRecord};
pub use value::Value;

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("unknown node '{0}'")]
    UnknownNode(String),

    #[error("node '{node}' has no topic '{topic}'")]
    UnknownTopic { node: String, topic: String },

    #[error("node '{node}' has no request '{func}'")]
    UnknownRequest { node: String, func: String },

    #[error("'{0}' is not a system mode")]
    UnknownMode(String),

    #[error("fault in '{node}': {message}")]
    Fault { node: String, message: String },
}

/// A running network.
pub struct Simulation {
    world: Rc<World>,
}

impl Simulation {
    /// Set up a network for `program`, which must have passed validation.
    /// Nothing runs until [`Simulation::boot`].
    pub fn new(program: &Program) -> Result<Self, SimError> {
        Ok(Self {
            world: interp::world_for(program)?,
        })
    }

    /// Print output events as they happen, the way the compiled program
    /// would.
    pub fn echo(self, on: bool) -> Self {
        self.world.set_echo(on);
        self
    }

    /// Wire listeners and run every node's `Init` behavior. Calling it
    /// again does nothing.
    pub fn boot(&self) {
        tracing::debug!("booting simulated network");
        self.world.boot();
    }

    pub fn request_system_mode(&self, mode: &str) -> Result<(), SimError> {
        if !self.world.knows_system_mode(mode) {
            return Err(SimError::UnknownMode(mode.to_string()));
        }
        tracing::debug!(mode, "system mode requested");
        self.world.request_system_mode(mode);
        Ok(())
    }

    /// Publish on a node's topic from outside the network.
    pub fn publish(&self, node: &str, topic: &str, value: Value) -> Result<(), SimError> {
        let index = self.node(node)?;
        if self.world.topic_value(index, topic).is_none() {
            return Err(SimError::UnknownTopic {
                node: node.to_string(),
                topic: topic.to_string(),
            });
        }
        self.world.publish_external(index, topic, value);
        Ok(())
    }

    /// Invoke a node's `onRequest` function and return its result.
    pub fn call(&self, node: &str, func: &str, args: Vec<Value>) -> Result<Value, SimError> {
        let index = self.node(node)?;
        if !self.world.has_request(index, func) {
            return Err(SimError::UnknownRequest {
                node: node.to_string(),
                func: func.to_string(),
            });
        }
        self.world.call_request(index, func, args).map_err(|fault| {
            let message = fault.message.clone();
            self.world.fault(node, fault);
            SimError::Fault {
                node: node.to_string(),
                message,
            }
        })
    }

    /// Ask a node to enter a local mode.
    pub fn set_state(&self, node: &str, state: &str) -> Result<(), SimError> {
        let index = self.node(node)?;
        self.world.set_state(index, state);
        Ok(())
    }

    pub fn trace(&self) -> Trace {
        Trace {
            events: self.world.events(),
        }
    }

    pub fn system_mode(&self) -> String {
        self.world.system_mode()
    }

    pub fn local_state(&self, node: &str) -> Result<String, SimError> {
        let index = self.node(node)?;
        Ok(self.world.local_state(index))
    }

    pub fn topic_value(&self, node: &str, topic: &str) -> Result<Value, SimError> {
        let index = self.node(node)?;
        self.world
            .topic_value(index, topic)
            .ok_or_else(|| SimError::UnknownTopic {
                node: self.world.node_name(index).to_string(),
                topic: topic.to_string(),
            })
    }

    fn node(&self, name: &str) -> Result<usize, SimError> {
        self.world
            .node_index(name)
            .ok_or_else(|| SimError::UnknownNode(name.to_string()))
    }
}

/// Boot `program`, then request each of `modes` in order.
pub fn simulate(program: &Program, modes: &[String]) -> Result<Trace, SimError> {
    let sim = Simulation::new(program)?;
    sim.boot();
    for mode in modes {
        sim.request_system_mode(mode)?;
    }
    Ok(sim.trace())
}
