// ABOUTME: Library root for the embeddable scripting engine

pub mod ast;
pub mod cache;
pub mod context;
pub mod engine;
pub mod env;
pub mod error;
pub mod host;
pub mod jsonpath;
pub mod lexer;
pub mod parser;
pub mod stdlib;
pub mod token;
pub mod value;
pub mod vm;

pub use cache::{Compiled, ModuleCache};
pub use context::{Context, Limits};
pub use engine::{Engine, Origin, Runtime, UseDirective};
pub use error::{EngineError, EvalError, Frame, FrameKind, ParseError, Pos};
pub use host::request::RequestState;
pub use host::response::ResponseData;
pub use host::stream::{StreamEvent, StreamRecord};
pub use host::trace::{BudgetBreach, TraceBudgets, TracePhase, TraceReport};
pub use host::{GlobalsMutator, RequestMutator, VarsMutator};
pub use value::{HostObject, NativeFn, Value};
