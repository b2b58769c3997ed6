//! Start-order dependency graph for configured services.
//!
//! Services declare `depends_on`; the graph turns that into a topological start
//! order (ties broken by registration order), start-up waves for display, and the
//! transitive-dependent sets the supervisor uses when a dependency fails.
//!
//! ## Example
//!
//! ```
//! use devrunner::graph::GraphBuilder;
//!
//! let graph = GraphBuilder::new()
//!     .service("db", &[])
//!     .service("api", &["db".to_string()])
//!     .service("web", &["api".to_string()])
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(graph.topological_order(), &[0, 1, 2]);
//! assert_eq!(graph.compute_waves(), vec![vec![0], vec![1], vec![2]]);
//! ```

mod builder;

pub use builder::{GraphBuilder, ServiceGraph, ServiceIndex};
