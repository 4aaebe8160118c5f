//! Numerical building blocks for habit discovery.
//!
//! This crate is independent of chess. It provides:
//!
//! - **Descriptive statistics**: mean, median, spread of a numeric sample
//! - **Standardization**: z-score scaling of numeric columns
//! - **Frequency tables**: top-k most frequent levels of a categorical column
//! - **Gower dissimilarity**: an all-pairs distance over mixed numeric/categorical rows
//! - **HDBSCAN**: density-based hierarchical clustering over a precomputed distance matrix
//! - **Sparse logistic regression**: L1-penalized, class-balanced binary classifier
//!
//! # Modules
//!
//! - [`descriptive`]: Descriptive statistics for summarizing datasets
//! - [`standardize`]: Column-wise z-score standardization
//! - [`frequency`]: Level counts and top-k selection
//! - [`dissimilarity`]: Gower's coefficient and the dissimilarity matrix
//! - [`hdbscan`]: Density clustering with soft membership
//! - [`logistic`]: L1 logistic regression solved by accelerated proximal gradient
//!
//! # Examples
//!
//! ## Clustering mixed rows
//!
//! ```
//! use blunderscope_stats::{
//!     dissimilarity::{DissimilarityMatrix, MixedRow},
//!     hdbscan::{HdbscanParams, hdbscan},
//! };
//!
//! let rows = (0..12)
//!     .map(|i| MixedRow {
//!         numeric: vec![f64::from(i % 6)],
//!         categorical: vec![usize::from(i >= 6); 3],
//!     })
//!     .collect::<Vec<_>>();
//! let matrix = DissimilarityMatrix::gower(&rows);
//! let params = HdbscanParams {
//!     min_cluster_size: 5,
//!     min_samples: 3,
//!     allow_single_cluster: false,
//! };
//! let clustering = hdbscan(&matrix, &params);
//! assert_eq!(clustering.labels.len(), 12);
//! assert_eq!(clustering.n_clusters(), 2);
//! ```
//!
//! ## Fitting a sparse classifier
//!
//! ```
//! use blunderscope_stats::logistic::{LogisticParams, fit_l1_balanced};
//!
//! let x = vec![vec![1.0, 0.0], vec![1.0, 1.0], vec![0.0, 1.0], vec![0.0, 0.0]];
//! let y = [true, true, false, false];
//! let model = fit_l1_balanced(&x, &y, &LogisticParams::default()).unwrap();
//! assert!(model.coefficients[0] > 0.0);
//! ```

pub mod descriptive;
pub mod dissimilarity;
pub mod frequency;
pub mod hdbscan;
pub mod logistic;
pub mod standardize;
