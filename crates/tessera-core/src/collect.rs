//! Packed numeric collections: the value type flowing through computations.
//!
//! A [`PackedCollection`] is a shaped view over shared `f64` memory. Cloning a
//! collection clones the handle, not the data, so a provider leaf and the code
//! that fills it observe the same buffer. Use [`PackedCollection::copy`] for a
//! deep copy.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};

/// Dimensions of a collection.
///
/// The first dimension is the *count*: the number of independent items a
/// kernel processes in parallel. The remaining dimensions describe one item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Creates a shape from its dimensions. An empty list denotes a scalar.
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        let dims = dims.into();
        if dims.is_empty() {
            Self { dims: vec![1] }
        } else {
            Self { dims }
        }
    }

    /// One-dimensional shape of `len` items.
    pub fn vector(len: usize) -> Self {
        Self { dims: vec![len] }
    }

    /// Shape of a single scalar.
    pub fn scalar() -> Self {
        Self { dims: vec![1] }
    }

    /// The dimensions.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Total number of elements.
    pub fn size(&self) -> usize {
        self.dims.iter().product()
    }

    /// Number of items along the first dimension.
    pub fn count(&self) -> usize {
        self.dims[0]
    }

    /// Number of elements per item.
    pub fn item_size(&self) -> usize {
        self.dims[1..].iter().product()
    }

    /// Returns this shape with a different leading count.
    pub fn with_count(&self, count: usize) -> Self {
        let mut dims = self.dims.clone();
        dims[0] = count;
        Self { dims }
    }

    /// Prepends a batch dimension.
    pub fn batched(&self, batch: usize) -> Self {
        let mut dims = Vec::with_capacity(self.dims.len() + 1);
        dims.push(batch);
        dims.extend_from_slice(&self.dims);
        Self { dims }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.dims.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", dims.join(", "))
    }
}

/// Shaped view over shared `f64` memory.
#[derive(Clone)]
pub struct PackedCollection {
    shape: Shape,
    offset: usize,
    memory: Arc<RwLock<Vec<f64>>>,
}

impl PackedCollection {
    /// Allocates a zero-filled collection.
    pub fn new(shape: Shape) -> Self {
        let memory = vec![0.0; shape.size()];
        Self {
            shape,
            offset: 0,
            memory: Arc::new(RwLock::new(memory)),
        }
    }

    /// Wraps `data` with the given shape.
    pub fn from_vec(shape: Shape, data: Vec<f64>) -> Result<Self> {
        if data.len() != shape.size() {
            return Err(Error::validation(
                "collection data",
                format!("{} values do not fill shape {shape}", data.len()),
            ));
        }
        Ok(Self {
            shape,
            offset: 0,
            memory: Arc::new(RwLock::new(data)),
        })
    }

    /// One-dimensional collection holding a copy of `values`.
    pub fn from_slice(values: &[f64]) -> Self {
        Self {
            shape: Shape::vector(values.len()),
            offset: 0,
            memory: Arc::new(RwLock::new(values.to_vec())),
        }
    }

    /// Collection holding a single value.
    pub fn scalar(value: f64) -> Self {
        Self::from_slice(&[value])
    }

    /// Shape of this view.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Number of elements in this view.
    pub fn len(&self) -> usize {
        self.shape.size()
    }

    /// Whether the view holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads one element.
    pub fn get(&self, index: usize) -> Option<f64> {
        if index >= self.len() {
            return None;
        }
        Some(self.memory.read()[self.offset + index])
    }

    /// Writes one element.
    pub fn set(&self, index: usize, value: f64) -> Result<()> {
        if index >= self.len() {
            return Err(Error::execution(format!(
                "index {index} out of bounds for collection of {}",
                self.len()
            )));
        }
        self.memory.write()[self.offset + index] = value;
        Ok(())
    }

    /// Copies the elements of this view out.
    pub fn to_vec(&self) -> Vec<f64> {
        let memory = self.memory.read();
        memory[self.offset..self.offset + self.len()].to_vec()
    }

    /// Overwrites the whole view with `values`.
    pub fn write(&self, values: &[f64]) -> Result<()> {
        if values.len() != self.len() {
            return Err(Error::ArgumentSize {
                index: usize::MAX,
                expected: self.len(),
                actual: values.len(),
            });
        }
        let mut memory = self.memory.write();
        memory[self.offset..self.offset + values.len()].copy_from_slice(values);
        Ok(())
    }

    /// Sets every element to `value`.
    pub fn fill(&self, value: f64) {
        let len = self.len();
        let mut memory = self.memory.write();
        memory[self.offset..self.offset + len].fill(value);
    }

    /// Deep copy with its own memory.
    pub fn copy(&self) -> Self {
        Self {
            shape: self.shape.clone(),
            offset: 0,
            memory: Arc::new(RwLock::new(self.to_vec())),
        }
    }

    /// View of `shape.size()` elements starting at `offset`, sharing memory.
    pub fn range(&self, offset: usize, shape: Shape) -> Result<Self> {
        if offset + shape.size() > self.len() {
            return Err(Error::validation(
                "collection range",
                format!(
                    "{shape} at offset {offset} exceeds collection of {}",
                    self.len()
                ),
            ));
        }
        Ok(Self {
            shape,
            offset: self.offset + offset,
            memory: Arc::clone(&self.memory),
        })
    }

    /// Same memory interpreted with a different shape of equal size.
    pub fn reshape(&self, shape: Shape) -> Result<Self> {
        if shape.size() != self.len() {
            return Err(Error::validation(
                "reshape",
                format!("{} cannot be viewed as {shape}", self.shape),
            ));
        }
        Ok(Self {
            shape,
            offset: self.offset,
            memory: Arc::clone(&self.memory),
        })
    }

    /// Whether both views share the same underlying memory.
    pub fn shares_memory(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.memory, &other.memory)
    }
}

impl fmt::Debug for PackedCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackedCollection")
            .field("shape", &self.shape)
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

impl PartialEq for PackedCollection {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && self.to_vec() == other.to_vec()
    }
}
