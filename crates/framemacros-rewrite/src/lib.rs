//! FrameMacros rewriting engine
//!
//! Turns the arguments of a row-oriented transformation call into
//! `sources => function => sink` pipeline triples:
//!
//! ```text
//! @transform(:full = :first * " " * :last, @t :a, :b = split(:name))
//!        |
//!        v  Rewriter::rewrite      classify, peel directives, collect @t,
//!   RewritePlan                    replace references, synthesize bodies
//!        |
//!        v  RewritePlan::bind      resolve specifiers, capture scope,
//!   Pipeline                       broadcast, name sinks
//! ```
//!
//! The engine never touches table data. Synthesized functions are handed
//! to the table engine, which calls them per row or once per column.

mod broadcast;
mod classify;
mod collect;
mod directive;
mod error;
mod eval;
mod plan;
mod resolve;
mod scope;
mod synth;
mod walk;

pub use broadcast::{broadcast_shapes, expand, Pairing};
pub use classify::{classify, DirectiveSet, NodeClass};
pub use collect::{collect_assignments, field_local, Collected};
pub use directive::{expand_block_arguments, peel, Peeled};
pub use error::{EvalError, PlanError, RewriteError};
pub use eval::{broadcast_map, Env, Evaluator, Mode};
pub use plan::{ArgumentPlan, Pipeline, PipelineTriple, RewritePlan, Rewriter, Sink, Target};
pub use resolve::{Binding, Reference, Resolver, PARAM_PREFIX};
pub use scope::Scope;
pub use synth::{AutoName, FunctionTemplate, SynthesizedFn};
