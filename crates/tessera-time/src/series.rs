//! Capacity-bounded `(time, value)` series in kernel-visible memory.
//!
//! The series lives in a single `[capacity + 1, 2]` collection. Row 0 is a
//! header holding the begin and end cursors; entries occupy rows
//! `begin..end`. Because the collection shares memory, a kernel that reads the
//! series (see [`AcceleratedTimeSeries::value_at_kernel`]) sees every entry
//! added after it was compiled.

use std::sync::Arc;

use tessera_core::{
    Cases, CollectionProducer, Computation, Error, Expression, ExpressionType, KernelIo,
    KernelStructureContext, NodeRef, PackedCollection, Repeated, Result, Scope, Shape,
};

/// First entry row; row 0 is the cursor header.
const FIRST_ROW: usize = 1;

/// An append-only series of timestamped values with a fixed capacity.
#[derive(Debug, Clone)]
pub struct AcceleratedTimeSeries {
    data: PackedCollection,
    capacity: usize,
}

impl AcceleratedTimeSeries {
    /// Default capacity, in entries.
    pub const DEFAULT_CAPACITY: usize = 10 * 1024 * 1024;

    /// An empty series holding up to `capacity` entries.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::validation("time series", "capacity must be positive"));
        }
        let series = Self {
            data: PackedCollection::new(Shape::new([capacity + 1, 2])),
            capacity,
        };
        series.set_cursors(FIRST_ROW, FIRST_ROW)?;
        Ok(series)
    }

    /// An empty series of [`DEFAULT_CAPACITY`](Self::DEFAULT_CAPACITY).
    pub fn with_default_capacity() -> Result<Self> {
        Self::new(Self::DEFAULT_CAPACITY)
    }

    /// The backing collection, header row included.
    pub fn collection(&self) -> &PackedCollection {
        &self.data
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn cursor(&self, index: usize) -> usize {
        self.data.get(index).map_or(FIRST_ROW, |v| v as usize)
    }

    fn begin(&self) -> usize {
        self.cursor(0)
    }

    fn end(&self) -> usize {
        self.cursor(1)
    }

    fn set_cursors(&self, begin: usize, end: usize) -> Result<()> {
        self.data.set(0, begin as f64)?;
        self.data.set(1, end as f64)
    }

    fn row(&self, row: usize) -> (f64, f64) {
        let time = self.data.get(2 * row).unwrap_or(0.0);
        let value = self.data.get(2 * row + 1).unwrap_or(0.0);
        (time, value)
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.end() - self.begin()
    }

    /// Whether the series holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries in time order as `(time, value)` pairs.
    pub fn entries(&self) -> Vec<(f64, f64)> {
        (self.begin()..self.end()).map(|row| self.row(row)).collect()
    }

    /// Appends an entry.
    ///
    /// Fails with [`Error::Full`] once the end cursor reaches the last row;
    /// purge or reset the series to make room.
    pub fn add(&self, time: f64, value: f64) -> Result<()> {
        let end = self.end();
        if end > self.capacity {
            return Err(Error::Full(format!(
                "time series of capacity {}",
                self.capacity
            )));
        }
        self.data.set(2 * end, time)?;
        self.data.set(2 * end + 1, value)?;
        self.set_cursors(self.begin(), end + 1)
    }

    /// Drops entries that can no longer affect values at or after `time`.
    ///
    /// The last entry at or before `time` is kept so that interpolation at
    /// `time` still has a left neighbor.
    pub fn purge(&self, time: f64) -> Result<()> {
        let (mut begin, end) = (self.begin(), self.end());
        while begin + 1 < end && self.row(begin + 1).0 <= time {
            begin += 1;
        }
        tracing::debug!(
            "time_series: purge to {time} drops {} entries",
            begin - self.begin()
        );
        self.set_cursors(begin, end)
    }

    /// Host-side linear interpolation at `time`.
    ///
    /// `None` when `time` is before the first entry or after the last.
    pub fn value_at(&self, time: f64) -> Option<f64> {
        let (begin, end) = (self.begin(), self.end());
        let right = (begin..end).find(|&row| self.row(row).0 >= time)?;
        let (right_time, right_value) = self.row(right);
        if right == begin {
            return (right_time == time).then_some(right_value);
        }
        let (left_time, left_value) = self.row(right - 1);
        let span = right_time - left_time;
        if span == 0.0 {
            Some(left_value)
        } else {
            Some(left_value + (time - left_time) / span * (right_value - left_value))
        }
    }

    /// Removes every entry.
    pub fn reset(&self) -> Result<()> {
        self.data.fill(0.0);
        self.set_cursors(FIRST_ROW, FIRST_ROW)
    }

    /// Kernel computation interpolating the series at each value of `times`.
    ///
    /// Times outside the series read as 0.
    pub fn value_at_kernel(&self, times: &CollectionProducer) -> CollectionProducer {
        let series: NodeRef = Arc::clone(CollectionProducer::provider(self.data.clone()).node());
        let node = SeriesValueAt {
            series,
            times: Arc::clone(times.node()),
        };
        CollectionProducer::from_node(Arc::new(node)).with_options(*times.options())
    }
}

/// Kernel form of [`AcceleratedTimeSeries::value_at`].
#[derive(Debug, Clone)]
struct SeriesValueAt {
    series: NodeRef,
    times: NodeRef,
}

impl Computation for SeriesValueAt {
    fn name(&self) -> String {
        "time_series_value_at".into()
    }

    fn shape(&self) -> Shape {
        self.times.shape()
    }

    fn inputs(&self) -> Vec<NodeRef> {
        vec![Arc::clone(&self.series), Arc::clone(&self.times)]
    }

    fn generate(&self, inputs: Vec<NodeRef>) -> NodeRef {
        let mut inputs = inputs.into_iter();
        Arc::new(Self {
            series: inputs.next().unwrap_or_else(|| Arc::clone(&self.series)),
            times: inputs.next().unwrap_or_else(|| Arc::clone(&self.times)),
        })
    }

    fn dynamic_source(&self) -> Option<(usize, usize)> {
        self.times.dynamic_source()
    }

    fn requires_array_inputs(&self) -> bool {
        true
    }

    fn scope(&self, ctx: &KernelStructureContext, io: &KernelIo) -> Result<Scope> {
        let (series, times) = (io.array(0)?, io.array(1)?);
        let kernel = ctx.kernel_index();
        let time_of = |row: Expression| Expression::load(series, row * 2);
        let value_of = |row: Expression| Expression::load(series, row * 2 + 1);

        let mut scope = Scope::new("time_series_value_at");
        let time = scope.declare("time", Expression::load(times, kernel.clone()));
        let begin = scope.declare("begin", Expression::load(series, 0).to_integer());
        let end = scope.declare("end", Expression::load(series, 1).to_integer());
        let result = scope.declare("result", 0.0);
        let found = scope.declare("found", false);

        let row = Expression::var("row", ExpressionType::Integer);
        let previous = row.clone() - 1;

        let mut interpolate = Scope::new("interpolate");
        let left_time = interpolate.declare("left_time", time_of(previous.clone()));
        let left_value = interpolate.declare("left_value", value_of(previous));
        let span = interpolate.declare("span", time_of(row.clone()) - left_time.clone());
        interpolate.assign(
            "result",
            Expression::conditional(
                span.clone().equal(0.0),
                left_value.clone(),
                left_value.clone()
                    + (time.clone() - left_time) / span * (value_of(row.clone()) - left_value),
            ),
        );

        let mut exact = Scope::new("exact");
        exact.assign("result", value_of(row.clone()));

        let mut hit = Scope::new("hit");
        hit.assign("found", true);
        hit.cases(
            Cases::new()
                .case(row.clone().greater_than(begin.clone()), interpolate)
                .case(time_of(row.clone()).equal(time.clone()), exact),
        );

        let mut body = Scope::new("scan");
        body.cases(Cases::new().case(time_of(row.clone()).greater_or_equal(time), hit));

        scope.repeat(Repeated {
            index: "row".into(),
            initial: begin,
            condition: row.less_than(end).and(found.not()),
            interval: Expression::integer(1),
            body,
        });
        scope.store(io.output.clone(), kernel, result);
        Ok(scope)
    }
}
