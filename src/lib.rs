//! Convenience wrapper over [Matplotlib][] for multi-panel figures
//! with tidy legends.
//!
//! Usage
//! -----
//!
//! A [`LegendFig`] owns one Matplotlib figure and an ordered collection
//! of axes built from a [`Layout`] descriptor.  Plot onto the axes,
//! then arrange legends, apply uniform styling and save:
//!
//! ```no_run
//! use legendfig::LegendFig;
//! let mut fig = LegendFig::new((8., 6.), 2, true)?;
//! fig.ax(0)?.xy(&[1., 2., 3.], &[1., 4., 2.]).label("up").plot();
//! fig.ax(1)?.xy(&[1., 2., 3.], &[2., 1., 3.]).label("down").plot();
//! fig.legend().ncol(2).draw_outside(0.0)?;
//! fig.pretty().apply()?;
//! fig.figure(Some("target/panels.png".as_ref()))?;
//! # Ok::<(), legendfig::Error>(())
//! ```
//!
//! [Matplotlib]: https://matplotlib.org/

use std::{
    fmt::{Display, Formatter},
    path::Path,
};
use lazy_static::lazy_static;
use pyo3::{
    prelude::*,
    intern,
    exceptions::{PyFileNotFoundError, PyPermissionError},
    types::PyDict,
};
use numpy::{
    PyArray1,
    PyArray2,
};

macro_rules! getattr {
    ($py: ident, $lib: expr, $f: literal) => {
        $lib.getattr($py, intern!($py, $f)).unwrap()
    };
}

macro_rules! meth {
    ($obj: expr, $m: ident, $py: ident -> $args: expr) => {
        Python::with_gil(|py| {
            let $py = py;
            $obj.call_method1(py, intern!(py, stringify!($m)), $args)
        })
    };
    ($obj: expr, $m: ident, $args: expr) => {
        Python::with_gil(|py| {
            $obj.call_method1(py, intern!(py, stringify!($m)), $args)
        })
    };
}

/// Possible errors of legendfig functions.
#[derive(Debug)]
pub enum Error {
    /// The Python library "matplotlib" was not found.
    NoMatplotlib,
    /// The path contains an element that is not a directory or does
    /// not exist.
    FileNotFoundError,
    /// Permission denied to access or create the filesystem path.
    PermissionError,
    /// The helper was constructed from an invalid [`Layout`] and owns
    /// no figure.
    NoFigure,
    /// The axes collection has no entry at this index.
    NoAxis(usize),
    /// The outside-legend source axis carries no labeled artists.
    NoLegendEntries,
    /// Other Python errors.
    Python(PyErr),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Error::NoMatplotlib =>
                write!(f, "The matplotlib library has not been found.\n\
Please install it.  See https://matplotlib.org/\n\
If you use Anaconda, see https://github.com/PyO3/pyo3/issues/1554"),
            Error::FileNotFoundError =>
                write!(f, "A path contains an element that is not a \
                           directory or does not exist"),
            Error::PermissionError =>
                write!(f, "Permission denied to access or create the \
                           filesystem path"),
            Error::NoFigure =>
                write!(f, "No figure exists; the layout descriptor was \
                           rejected at construction"),
            Error::NoAxis(i) =>
                write!(f, "No axis with index {} in the axes collection", i),
            Error::NoLegendEntries =>
                write!(f, "The source axis has no labeled artists to \
                           collect into an outside legend"),
            Error::Python(e) =>
                write!(f, "Python error: {}", e),
        }
    }
}

impl std::error::Error for Error {}

/// Import and return a handle to the module `$m`.
macro_rules! pyimport { ($m: literal) => {
    Python::with_gil(|py|
        PyModule::import(py, intern!(py, $m)).map(|m| m.into()))
}}

lazy_static! {
    // Import matplotlib modules.
    static ref PYPLOT: Result<Py<PyModule>, PyErr> = {
        pyimport!("matplotlib.pyplot")
    };
    static ref MPL_TEXT: Result<Py<PyModule>, PyErr> = {
        pyimport!("matplotlib.text")
    };
    static ref NUMPY: Result<Numpy, PyErr> = {
        Ok(Numpy {
            numpy: pyimport!("numpy.ctypeslib")?,
            ctypes: pyimport!("ctypes")?,
        })
    };
}

/// Return a handle to the module `$m`.
/// ⚠ This may try to lock Python's GIL.  Make sure it is executed
/// outside a call to `Python::with_gil`.
macro_rules! pymod { ($m: ident) => {
    $m.as_ref().map_err(|_| Error::NoMatplotlib)
}}


/// Represent a "connection" to the `numpy` module to be able to
/// perform copy-free conversions of data.
#[derive(Clone)]
pub struct Numpy {
    numpy: Py<PyModule>,
    ctypes: Py<PyModule>,
}

/// Trait expressing that `Self` can be converted to a numpy.ndarray
/// (without copying).  `Numpy` is a handle to the numpy library.
pub trait Data {
    fn to_numpy(&self, py: Python, p: &Numpy) -> PyObject;
}

impl<T> Data for T where T: AsRef<[f64]> + ?Sized {
    fn to_numpy(&self, py: Python, p: &Numpy) -> PyObject {
        let x = self.as_ref();
        // ctypes.POINTER(ctypes.c_double)
        let ty = getattr!(py, p.ctypes, "POINTER")
            .call1(py, (getattr!(py, p.ctypes, "c_double"),)).unwrap();
        // ctypes.cast(x.as_ptr(), ty)
        let ptr = getattr!(py, p.ctypes, "cast")
            .call1(py, (x.as_ptr() as usize, ty)).unwrap();
        // numpy.ctypeslib.as_array(ptr, shape=(x.len(),))
        getattr!(py, p.numpy, "as_array")
            .call1(py, (ptr, (x.len(),))).unwrap()
    }
}

/// Layout descriptor deciding how many panels a [`LegendFig`] holds
/// and where they sit.
///
/// Usually built through a conversion: an integer gives stacked
/// panels, a pair gives a grid, a vector of 3-digit subplot codes
/// gives explicit positions and the string `"paramspace"` gives the
/// fixed scatter-plus-marginals template.  Any other string converts
/// to [`Layout::Invalid`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// `n` panels stacked top to bottom, sharing the figure width.
    Stack(usize),
    /// A rows × columns grid, flattened in row-major order.
    Grid(usize, usize),
    /// One panel per Matplotlib 3-digit subplot code, e.g.
    /// `[211, 223, 224]`.  Fewer than 3 codes is rejected.
    Codes(Vec<u16>),
    /// Central square panel with a histogram panel above it and
    /// another to its right, ticks pointing inward.
    Paramspace,
    /// Rejected at construction with a printed usage message.
    Invalid,
}

impl From<usize> for Layout {
    fn from(n: usize) -> Self { Layout::Stack(n) }
}

impl From<(usize, usize)> for Layout {
    fn from((r, c): (usize, usize)) -> Self { Layout::Grid(r, c) }
}

impl From<Vec<u16>> for Layout {
    fn from(codes: Vec<u16>) -> Self { Layout::Codes(codes) }
}

impl From<&[u16]> for Layout {
    fn from(codes: &[u16]) -> Self { Layout::Codes(codes.to_vec()) }
}

impl From<&str> for Layout {
    fn from(s: &str) -> Self {
        if s == "paramspace" { Layout::Paramspace } else { Layout::Invalid }
    }
}

fn print_format() {
    println!("Provide the layout in format:");
    println!("- int for number of subplots");
    println!("- pair (N, M) for NxM subplots");
    println!("- codes e.g. [211, 223, 224] for specific subplots");
    println!("- \"paramspace\" for a central plot with 2 histos on the sides");
}

// Fractional rectangles of the paramspace template: main square
// panel, histogram above, histogram on the right.
const PS_LEFT: f64 = 0.13;
const PS_BOTTOM: f64 = 0.1;
const PS_WIDTH: f64 = 0.65;
const PS_HEIGHT: f64 = 0.65;
const PS_SPACING: f64 = 0.005;

/// One rectangular plotting region of the figure, with its own
/// coordinate system, ticks and optional legend.
#[derive(Debug, Clone)]
pub struct Axes {
    ax: PyObject,
}

/// The figure helper: owns one Matplotlib figure, the ordered axes
/// collection, and the shared outside legend if one was drawn.
///
/// Construction with an invalid [`Layout`] prints a usage message and
/// leaves the helper degraded (no figure, zero axes); operations that
/// need the figure then return [`Error::NoFigure`].
#[derive(Debug)]
pub struct LegendFig {
    fig: Option<PyObject>, // instance of matplotlib.figure.Figure
    axes: Vec<Axes>,
    lgd: Option<PyObject>, // figure-level legend, kept for savefig
}

impl LegendFig {
    /// Build a figure of size `figsize` (width × height in inches)
    /// with panels arranged per `layout`.  `sharex` links the x axes
    /// of stacked panels; the other layouts ignore it.
    ///
    /// ```no_run
    /// use legendfig::LegendFig;
    /// let fig = LegendFig::new((8., 6.), (2, 3), false)?;
    /// assert_eq!(fig.axes_len(), 6);
    /// # Ok::<(), legendfig::Error>(())
    /// ```
    pub fn new(figsize: (f64, f64), layout: impl Into<Layout>,
               sharex: bool) -> Result<LegendFig, Error> {
        let pyplot = pymod!(PYPLOT)?;
        let layout = layout.into();
        // Validate the descriptor before any figure is allocated so
        // the invalid path cannot leak a figure handle.
        match &layout {
            Layout::Stack(0) | Layout::Invalid => {
                print_format();
                return Ok(LegendFig { fig: None, axes: vec![], lgd: None });
            }
            Layout::Codes(codes) if codes.len() < 3 => {
                print_format();
                return Ok(LegendFig { fig: None, axes: vec![], lgd: None });
            }
            _ => {}
        }
        Python::with_gil(|py| {
            let (fig, axes) = match layout {
                Layout::Stack(n) => Self::stack(py, pyplot, figsize,
                                                n, sharex)?,
                Layout::Grid(r, c) => Self::grid(py, pyplot, figsize, r, c)?,
                Layout::Codes(codes) => Self::codes(py, pyplot, figsize,
                                                    &codes)?,
                Layout::Paramspace => Self::paramspace(py, pyplot, figsize)?,
                Layout::Invalid => unreachable!(),
            };
            Ok(LegendFig { fig: Some(fig), axes, lgd: None })
        })
    }

    fn stack(py: Python, pyplot: &Py<PyModule>, figsize: (f64, f64),
             n: usize, sharex: bool) -> Result<(PyObject, Vec<Axes>), Error> {
        let kwargs = PyDict::new(py);
        kwargs.set_item("figsize", figsize).unwrap();
        kwargs.set_item("sharex", sharex).unwrap();
        let res = getattr!(py, pyplot, "subplots")
            .call(py, (n,), Some(kwargs))
            .map_err(Error::Python)?;
        let (fig, axs): (PyObject, PyObject) =
            res.extract(py).map_err(Error::Python)?;
        let axes = if n == 1 {
            vec![Axes { ax: axs }]
        } else {
            let axg: &PyArray1<PyObject> = axs.downcast(py).unwrap();
            (0..n).map(|i| Axes { ax: axg.get_owned(i).unwrap() }).collect()
        };
        Ok((fig, axes))
    }

    fn grid(py: Python, pyplot: &Py<PyModule>, figsize: (f64, f64),
            r: usize, c: usize) -> Result<(PyObject, Vec<Axes>), Error> {
        let kwargs = PyDict::new(py);
        kwargs.set_item("figsize", figsize).unwrap();
        // squeeze=False keeps the returned array 2-D for any (r, c).
        kwargs.set_item("squeeze", false).unwrap();
        let res = getattr!(py, pyplot, "subplots")
            .call(py, (r, c), Some(kwargs))
            .map_err(Error::Python)?;
        let (fig, axs): (PyObject, PyObject) =
            res.extract(py).map_err(Error::Python)?;
        let axg: &PyArray2<PyObject> = axs.downcast(py).unwrap();
        let mut axes = Vec::with_capacity(r * c);
        for i in 0..r {
            for j in 0..c {
                axes.push(Axes { ax: axg.get_owned([i, j]).unwrap() });
            }
        }
        Ok((fig, axes))
    }

    fn codes(py: Python, pyplot: &Py<PyModule>, figsize: (f64, f64),
             codes: &[u16]) -> Result<(PyObject, Vec<Axes>), Error> {
        let fig = Self::bare_figure(py, pyplot, figsize)?;
        let mut axes = Vec::with_capacity(codes.len());
        for &code in codes {
            let ax = fig.call_method1(py, intern!(py, "add_subplot"), (code,))
                .map_err(Error::Python)?;
            axes.push(Axes { ax });
        }
        Ok((fig, axes))
    }

    fn paramspace(py: Python, pyplot: &Py<PyModule>, figsize: (f64, f64))
                  -> Result<(PyObject, Vec<Axes>), Error> {
        let rect_scatter = (PS_LEFT, PS_BOTTOM, PS_WIDTH, PS_HEIGHT);
        let rect_histx = (PS_LEFT, PS_BOTTOM + PS_HEIGHT + PS_SPACING,
                          PS_WIDTH, 0.2);
        let rect_histy = (PS_LEFT + PS_WIDTH + PS_SPACING, PS_BOTTOM,
                          0.2, PS_HEIGHT);

        let fig = Self::bare_figure(py, pyplot, figsize)?;
        let add_axes = |rect: (f64, f64, f64, f64)| {
            fig.call_method1(py, intern!(py, "add_axes"), (rect,))
                .map(|ax| Axes { ax })
                .map_err(Error::Python)
        };
        // Main square panel in the middle.
        let main = add_axes(rect_scatter)?;
        let kwargs = PyDict::new(py);
        kwargs.set_item("direction", "in").unwrap();
        kwargs.set_item("top", true).unwrap();
        kwargs.set_item("right", true).unwrap();
        main.ax.call_method(py, intern!(py, "tick_params"), (), Some(kwargs))
            .map_err(Error::Python)?;
        // Histogram on top of the main one.
        let histx = add_axes(rect_histx)?;
        let kwargs = PyDict::new(py);
        kwargs.set_item("direction", "in").unwrap();
        kwargs.set_item("labelbottom", false).unwrap();
        histx.ax.call_method(py, intern!(py, "tick_params"), (), Some(kwargs))
            .map_err(Error::Python)?;
        // Histogram at the side.
        let histy = add_axes(rect_histy)?;
        let kwargs = PyDict::new(py);
        kwargs.set_item("direction", "in").unwrap();
        kwargs.set_item("labelleft", false).unwrap();
        histy.ax.call_method(py, intern!(py, "tick_params"), (), Some(kwargs))
            .map_err(Error::Python)?;
        Ok((fig, vec![main, histx, histy]))
    }

    fn bare_figure(py: Python, pyplot: &Py<PyModule>, figsize: (f64, f64))
                   -> Result<PyObject, Error> {
        let kwargs = PyDict::new(py);
        kwargs.set_item("figsize", figsize).unwrap();
        getattr!(py, pyplot, "figure")
            .call(py, (), Some(kwargs))
            .map_err(Error::Python)
    }

    /// Number of entries in the axes collection.  Twin axes created
    /// by [`LegendFig::add_axis`] count too.
    pub fn axes_len(&self) -> usize {
        self.axes.len()
    }

    /// Panel `i` of the axes collection, in creation order.
    pub fn ax(&mut self, i: usize) -> Result<&mut Axes, Error> {
        self.axes.get_mut(i).ok_or(Error::NoAxis(i))
    }

    /// Whether a shared outside legend has been drawn.
    pub fn has_outside_legend(&self) -> bool {
        self.lgd.is_some()
    }

    /// Start customizing legends; finish with [`Legend::draw`] for
    /// per-axis legends or [`Legend::draw_outside`] for one shared
    /// legend below the figure.
    pub fn legend(&mut self) -> Legend<'_> {
        Legend { fig: self, ncol: 1, title: None, loc: None,
                 locs: None, axes: None }
    }

    /// Start the uniform styling pass; finish with [`Pretty::apply`].
    pub fn pretty(&mut self) -> Pretty<'_> {
        Pretty { fig: self, large: 3, stretch: None,
                 grid: Some(GridWhich::Major) }
    }

    /// Add a second Y axis as a twin of axis `src` (shared x axis),
    /// append it to the axes collection and return its index.
    ///
    /// `col` tints the new axis' y tick labels, which helps to see
    /// which curve belongs to which scale.
    pub fn add_axis(&mut self, src: usize, col: Option<&str>)
                    -> Result<usize, Error> {
        let ax = self.axes.get(src).ok_or(Error::NoAxis(src))?;
        let twin = Python::with_gil(|py| {
            let twin = ax.ax.call_method0(py, intern!(py, "twinx"))
                .map_err(Error::Python)?;
            if let Some(col) = col {
                let kwargs = PyDict::new(py);
                kwargs.set_item("axis", "y").unwrap();
                kwargs.set_item("colors", col).unwrap();
                twin.call_method(py, intern!(py, "tick_params"),
                                 (), Some(kwargs))
                    .map_err(Error::Python)?;
            }
            Ok(twin)
        })?;
        self.axes.push(Axes { ax: twin });
        Ok(self.axes.len() - 1)
    }

    /// Show the figure or save an image.
    ///
    /// With a `name` the figure is written to that path (the extension
    /// picks the image format), cropped tight and including the shared
    /// legend if one exists; without it the figure is displayed
    /// interactively.  Either way an informational line is printed.
    pub fn figure(&mut self, name: Option<&Path>) -> Result<(), Error> {
        let fig = self.fig.as_ref().ok_or(Error::NoFigure)?;
        match name {
            None => {
                println!("Image: None");
                println!("(NOT SAVED)");
                let pyplot = pymod!(PYPLOT)?;
                Python::with_gil(|py| {
                    getattr!(py, pyplot, "show").call0(py)
                        .map_err(Error::Python)
                })?;
            }
            Some(path) => {
                println!("Image: {}", path.display());
                Python::with_gil(|py| {
                    let kwargs = PyDict::new(py);
                    kwargs.set_item("bbox_inches", "tight").unwrap();
                    if let Some(lgd) = &self.lgd {
                        kwargs.set_item("bbox_extra_artists",
                                        (lgd.clone_ref(py),)).unwrap();
                    }
                    fig.call_method(py, intern!(py, "savefig"),
                                    (path,), Some(kwargs))
                        .map_err(|e| {
                            if e.is_instance_of::<PyFileNotFoundError>(py) {
                                Error::FileNotFoundError
                            } else if e.is_instance_of::<PyPermissionError>(py) {
                                Error::PermissionError
                            } else {
                                Error::Python(e)
                            }
                        })
                })?;
                println!("(saved)");
            }
        }
        Ok(())
    }
}

impl Drop for LegendFig {
    fn drop(&mut self) {
        // Release the figure slot held by pyplot so batch production
        // of many figures does not exhaust the renderer.
        if let Some(fig) = self.fig.take() {
            if let Ok(pyplot) = pymod!(PYPLOT) {
                Python::with_gil(|py| {
                    let _ = getattr!(py, pyplot, "close").call1(py, (fig,));
                });
            }
        }
    }
}

/// Options for legend placement, created by [`LegendFig::legend`].
#[must_use]
pub struct Legend<'a> {
    fig: &'a mut LegendFig,
    ncol: usize,
    title: Option<&'a str>,
    loc: Option<&'a str>,
    locs: Option<&'a [&'a str]>,
    axes: Option<&'a [usize]>,
}

impl<'a> Legend<'a> {
    /// Number of columns in the legend (default 1).
    pub fn ncol(mut self, n: usize) -> Self {
        self.ncol = n;
        self
    }

    /// Legend title, applied to every legend drawn.
    pub fn title(mut self, title: &'a str) -> Self {
        self.title = Some(title);
        self
    }

    /// One placement token for all axes, e.g. `"upper left"`.  The
    /// default lets Matplotlib pick the best location.
    pub fn loc(mut self, loc: &'a str) -> Self {
        self.loc = Some(loc);
        self
    }

    /// Per-axis placement tokens, indexed by axis position in the
    /// collection.  Takes precedence over [`Legend::loc`].
    pub fn locs(mut self, locs: &'a [&'a str]) -> Self {
        self.locs = Some(locs);
        self
    }

    /// Restrict drawing to the given axis indices (default: all).
    /// Useful when twin axes share a panel and stacked legends would
    /// collide.
    pub fn axes(mut self, axes: &'a [usize]) -> Self {
        self.axes = Some(axes);
        self
    }

    /// Draw one legend on each selected axis from that axis' own
    /// handles.
    pub fn draw(self) -> Result<(), Error> {
        if self.fig.fig.is_none() {
            return Err(Error::NoFigure);
        }
        let indices: Vec<usize> = match self.axes {
            Some(axes) => axes.to_vec(),
            None => (0..self.fig.axes.len()).collect(),
        };
        Python::with_gil(|py| {
            for i in indices {
                let ax = self.fig.axes.get(i).ok_or(Error::NoAxis(i))?;
                let kwargs = PyDict::new(py);
                kwargs.set_item("ncol", self.ncol).unwrap();
                if let Some(title) = self.title {
                    kwargs.set_item("title", title).unwrap();
                }
                let loc = self.locs
                    .map_or(self.loc, |locs| locs.get(i).copied());
                if let Some(loc) = loc {
                    kwargs.set_item("loc", loc).unwrap();
                }
                ax.ax.call_method(py, intern!(py, "legend"), (), Some(kwargs))
                    .map_err(Error::Python)?;
            }
            Ok(())
        })
    }

    /// Draw a single shared legend below the figure, anchored at the
    /// bottom center and moved down by `offset` (order of 0.05), from
    /// the handles of the *last* axis in the collection.  Inline
    /// legends still attached to any axis are removed.  A previous
    /// outside legend is replaced.
    pub fn draw_outside(self, offset: f64) -> Result<(), Error> {
        let fig = self.fig.fig.as_ref().ok_or(Error::NoFigure)?;
        let last = self.fig.axes.last().ok_or(Error::NoAxis(0))?;
        let lgd = Python::with_gil(|py| {
            let hl = last.ax
                .call_method0(py, intern!(py, "get_legend_handles_labels"))
                .map_err(Error::Python)?;
            let (handles, labels): (PyObject, Vec<String>) =
                hl.extract(py).map_err(Error::Python)?;
            if labels.is_empty() {
                return Err(Error::NoLegendEntries);
            }
            let kwargs = PyDict::new(py);
            kwargs.set_item("loc", "lower center").unwrap();
            kwargs.set_item("ncol", self.ncol).unwrap();
            kwargs.set_item("fontsize", 15).unwrap();
            kwargs.set_item("bbox_to_anchor", (0.5, 0.05 - offset)).unwrap();
            if let Some(title) = self.title {
                kwargs.set_item("title", title).unwrap();
            }
            let lgd = fig.call_method(py, intern!(py, "legend"),
                                      (handles, labels), Some(kwargs))
                .map_err(Error::Python)?;
            // Remove inline legends so they do not duplicate the
            // shared one.  Axes without a legend are skipped.
            for ax in &self.fig.axes {
                let inline = ax.ax.call_method0(py, intern!(py, "get_legend"))
                    .map_err(Error::Python)?;
                if !inline.is_none(py) {
                    inline.call_method0(py, intern!(py, "remove"))
                        .map_err(Error::Python)?;
                }
            }
            Ok(lgd)
        })?;
        self.fig.lgd = Some(lgd);
        Ok(())
    }
}

/// Gridline selection for [`Pretty::grid`], as Matplotlib's `which`
/// argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridWhich {
    Major,
    Minor,
}

impl GridWhich {
    fn token(self) -> &'static str {
        match self {
            GridWhich::Major => "major",
            GridWhich::Minor => "minor",
        }
    }
}

/// Axis-limit padding mode for [`Pretty::stretch`].  Useful when the
/// automatic range makes the leftmost and rightmost points fall right
/// on the frame and get eaten up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stretch {
    /// Expand each x and y bound outward by 0.5% of its magnitude; a
    /// zero bound is nudged to ±0.01.
    Float,
    /// Expand the x range by one unit on each side, for year-valued
    /// axes.
    Year,
}

const STRETCH_STRENGTH: f64 = 0.005;

fn pad_float_bound(v: f64, upper: bool) -> f64 {
    if v > 0.0 {
        v * (1.0 + if upper { STRETCH_STRENGTH } else { -STRETCH_STRENGTH })
    } else if v < 0.0 {
        v * (1.0 + if upper { -STRETCH_STRENGTH } else { STRETCH_STRENGTH })
    } else if upper {
        0.01
    } else {
        -0.01
    }
}

fn pad_float(lim: (f64, f64)) -> (f64, f64) {
    (pad_float_bound(lim.0, false), pad_float_bound(lim.1, true))
}

fn pad_year(lim: (f64, f64)) -> (f64, f64) {
    (lim.0 - 1.0, lim.1 + 1.0)
}

/// Options for the uniform styling pass, created by
/// [`LegendFig::pretty`].
#[must_use]
pub struct Pretty<'a> {
    fig: &'a mut LegendFig,
    large: i32,
    stretch: Option<Stretch>,
    grid: Option<GridWhich>,
}

impl Pretty<'_> {
    /// Font-size increment (default 3): tick labels become
    /// `15 + large`, axis labels `17 + large`, legend entries
    /// `17 + large` and legend titles `19 + large`.
    pub fn large(mut self, large: i32) -> Self {
        self.large = large;
        self
    }

    /// Pad the axis limits (default: leave them alone).
    pub fn stretch(mut self, stretch: Stretch) -> Self {
        self.stretch = Some(stretch);
        self
    }

    /// Draw dashed gridlines beneath the data for the given tick
    /// class (default major).
    pub fn grid(mut self, which: GridWhich) -> Self {
        self.grid = Some(which);
        self
    }

    /// Draw no gridlines.
    pub fn no_grid(mut self) -> Self {
        self.grid = None;
        self
    }

    /// Apply the styling to every axis of the collection and to the
    /// figure-level texts.
    pub fn apply(self) -> Result<(), Error> {
        let fig = self.fig.fig.as_ref().ok_or(Error::NoFigure)?;
        let text_mod = pymod!(MPL_TEXT)?;
        Python::with_gil(|py| {
            // Shared outside legend first; it belongs to no axis.
            if let Some(lgd) = &self.fig.lgd {
                resize_legend(py, lgd, self.large)?;
            }
            for ax in &self.fig.axes {
                if let Some(stretch) = self.stretch {
                    stretch_limits(py, &ax.ax, stretch)?;
                }
                // Tick sizes (the numbers) and axis label sizes.
                for get in ["get_xaxis", "get_yaxis"] {
                    let axis = ax.ax.call_method0(py, get)
                        .map_err(Error::Python)?;
                    let ticks = axis
                        .call_method0(py, intern!(py, "get_ticklabels"))
                        .map_err(Error::Python)?;
                    for t in ticks.as_ref(py).iter()
                        .map_err(Error::Python)? {
                        t.map_err(Error::Python)?
                            .call_method1(intern!(py, "set_fontsize"),
                                          (15 + self.large,))
                            .map_err(Error::Python)?;
                    }
                    axis.call_method0(py, intern!(py, "get_label"))
                        .map_err(Error::Python)?
                        .call_method1(py, intern!(py, "set_fontsize"),
                                      (17 + self.large,))
                        .map_err(Error::Python)?;
                }
                // Panel title stays at a fixed size.
                ax.ax.getattr(py, intern!(py, "title"))
                    .map_err(Error::Python)?
                    .call_method1(py, intern!(py, "set_fontsize"), (20,))
                    .map_err(Error::Python)?;
                // Inline legend, if present.
                let legend = ax.ax.call_method0(py, intern!(py, "get_legend"))
                    .map_err(Error::Python)?;
                if !legend.is_none(py) {
                    resize_legend(py, &legend, self.large)?;
                }
                if let Some(which) = self.grid {
                    let kwargs = PyDict::new(py);
                    kwargs.set_item("linestyle", "--").unwrap();
                    kwargs.set_item("zorder", 0).unwrap();
                    kwargs.set_item("which", which.token()).unwrap();
                    ax.ax.call_method(py, intern!(py, "grid"),
                                      (), Some(kwargs))
                        .map_err(Error::Python)?;
                }
            }
            // Texts owned directly by the figure (suptitle etc.).
            let text_ty = getattr!(py, text_mod, "Text");
            let children = fig
                .call_method0(py, intern!(py, "get_children"))
                .map_err(Error::Python)?;
            for child in children.as_ref(py).iter().map_err(Error::Python)? {
                let child = child.map_err(Error::Python)?;
                if child.is_instance(text_ty.as_ref(py))
                    .map_err(Error::Python)? {
                    child.call_method1(intern!(py, "set_fontsize"), (20,))
                        .map_err(Error::Python)?;
                }
            }
            Ok(())
        })
    }
}

fn stretch_limits(py: Python, ax: &PyObject, stretch: Stretch)
                  -> Result<(), Error> {
    let xlim: (f64, f64) = ax.call_method0(py, intern!(py, "get_xlim"))
        .map_err(Error::Python)?
        .extract(py).map_err(Error::Python)?;
    let ylim: (f64, f64) = ax.call_method0(py, intern!(py, "get_ylim"))
        .map_err(Error::Python)?
        .extract(py).map_err(Error::Python)?;
    let (xlim, ylim) = match stretch {
        Stretch::Float => (pad_float(xlim), pad_float(ylim)),
        Stretch::Year => (pad_year(xlim), ylim),
    };
    ax.call_method1(py, intern!(py, "set_xlim"), xlim)
        .map_err(Error::Python)?;
    ax.call_method1(py, intern!(py, "set_ylim"), ylim)
        .map_err(Error::Python)?;
    Ok(())
}

fn resize_legend(py: Python, lgd: &PyObject, large: i32)
                 -> Result<(), Error> {
    let title = lgd.call_method0(py, intern!(py, "get_title"))
        .map_err(Error::Python)?;
    if title.as_ref(py).is_truthy().map_err(Error::Python)? {
        title.call_method1(py, intern!(py, "set_fontsize"), (19 + large,))
            .map_err(Error::Python)?;
    }
    let texts = lgd.call_method0(py, intern!(py, "get_texts"))
        .map_err(Error::Python)?;
    for t in texts.as_ref(py).iter().map_err(Error::Python)? {
        t.map_err(Error::Python)?
            .call_method1(intern!(py, "set_fontsize"), (17 + large,))
            .map_err(Error::Python)?;
    }
    Ok(())
}


impl Axes {
    /// Plot `y` versus `x` as lines and/or markers.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use legendfig::LegendFig;
    /// let mut fig = LegendFig::new((6., 4.), 1, false)?;
    /// fig.ax(0)?.xy(&[1., 2., 3., 4.], &[1., 4., 2., 3.]).plot();
    /// fig.figure(Some("target/xy.pdf".as_ref()))?;
    /// # Ok::<(), legendfig::Error>(())
    /// ```
    #[must_use]
    pub fn xy<'a, D>(&'a mut self, x: &'a D, y: &'a D) -> XY<'a, D>
    where D: Data + ?Sized {
        // We mutably borrow `self` to reflect that the final `.plot()`
        // will mutate the underlying Python object.
        XY { axes: self,
             options: PlotOptions::new(),
             x, y }
    }

    /// Scatter-plot `y` versus `x`, typically on the main paramspace
    /// panel.
    pub fn scatter<D>(&mut self, x: &D, y: &D) -> &mut Self
    where D: Data + ?Sized {
        let numpy = pymod!(NUMPY).unwrap();
        meth!(self.ax, scatter, py -> {
            let xn = x.to_numpy(py, &numpy);
            let yn = y.to_numpy(py, &numpy);
            (xn, yn) })
            .unwrap();
        self
    }

    /// Histogram of `x` with `bins` bins, typically on a marginal
    /// paramspace panel.
    pub fn hist<D>(&mut self, x: &D, bins: usize) -> &mut Self
    where D: Data + ?Sized {
        let numpy = pymod!(NUMPY).unwrap();
        meth!(self.ax, hist, py -> {
            let xn = x.to_numpy(py, &numpy);
            (xn, bins) })
            .unwrap();
        self
    }

    pub fn set_title(&mut self, v: &str) -> &mut Self {
        meth!(self.ax, set_title, (v,)).unwrap();
        self
    }

    pub fn set_xlabel(&mut self, label: &str) -> &mut Self {
        meth!(self.ax, set_xlabel, (label,)).unwrap();
        self
    }

    pub fn set_ylabel(&mut self, label: &str) -> &mut Self {
        meth!(self.ax, set_ylabel, (label,)).unwrap();
        self
    }

    /// Current x limits, as set by the autoscaler or a stretch pass.
    pub fn xlim(&self) -> Result<(f64, f64), Error> {
        Python::with_gil(|py| {
            self.ax.call_method0(py, intern!(py, "get_xlim"))
                .map_err(Error::Python)?
                .extract(py).map_err(Error::Python)
        })
    }

    /// Current y limits.
    pub fn ylim(&self) -> Result<(f64, f64), Error> {
        Python::with_gil(|py| {
            self.ax.call_method0(py, intern!(py, "get_ylim"))
                .map_err(Error::Python)?
                .extract(py).map_err(Error::Python)
        })
    }
}

#[derive(Clone)]
struct PlotOptions<'a> {
    fmt: &'a str,
    label: &'a str,
    color: Option<&'a str>,
    linewidth: Option<f64>,
}

impl<'a> PlotOptions<'a> {
    fn new() -> PlotOptions<'static> {
        PlotOptions { fmt: "", label: "", color: None, linewidth: None }
    }

    fn kwargs(&'a self, py: Python<'a>) -> &'a PyDict {
        let kwargs = PyDict::new(py);
        if !self.label.is_empty() {
            kwargs.set_item("label", self.label).unwrap()
        }
        if let Some(c) = self.color {
            kwargs.set_item("color", c).unwrap()
        }
        if let Some(w) = self.linewidth {
            kwargs.set_item("linewidth", w).unwrap()
        }
        kwargs
    }
}

/// X-Y dataset waiting to be plotted; build options with the methods,
/// then call [`XY::plot`].
#[must_use]
pub struct XY<'a, D>
where D: ?Sized {
    axes: &'a Axes,
    options: PlotOptions<'a>,
    x: &'a D,
    y: &'a D,
}

impl<'a, D> XY<'a, D>
where D: Data + ?Sized {
    /// Matplotlib format string, e.g. `"r."` for red dots.
    pub fn fmt(mut self, fmt: &'a str) -> Self {
        self.options.fmt = fmt;
        self
    }

    /// Label under which the curve appears in legends.
    pub fn label(mut self, label: &'a str) -> Self {
        self.options.label = label;
        self
    }

    pub fn color(mut self, color: &'a str) -> Self {
        self.options.color = Some(color);
        self
    }

    pub fn linewidth(mut self, w: f64) -> Self {
        self.options.linewidth = Some(w);
        self
    }

    /// Plot the data with the options specified in [`XY`].
    pub fn plot(self) {
        let numpy = pymod!(NUMPY).unwrap();
        Python::with_gil(|py| {
            let xn = self.x.to_numpy(py, numpy);
            let yn = self.y.to_numpy(py, numpy);
            self.axes.ax.call_method(py, "plot",
                                     (xn, yn, self.options.fmt),
                                     Some(self.options.kwargs(py)))
                .unwrap();
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_single() -> Result<(), Error> {
        let fig = LegendFig::new((6., 4.), 1, false)?;
        assert_eq!(fig.axes_len(), 1);
        Ok(())
    }

    #[test]
    fn stack_many() -> Result<(), Error> {
        let fig = LegendFig::new((6., 8.), 4, true)?;
        assert_eq!(fig.axes_len(), 4);
        Ok(())
    }

    #[test]
    fn grid_row_major() -> Result<(), Error> {
        let fig = LegendFig::new((9., 6.), (2, 3), false)?;
        assert_eq!(fig.axes_len(), 6);
        Ok(())
    }

    #[test]
    fn subplot_codes() -> Result<(), Error> {
        let fig = LegendFig::new((8., 6.), vec![211u16, 223, 224], false)?;
        assert_eq!(fig.axes_len(), 3);
        Ok(())
    }

    #[test]
    fn paramspace_three_panels() -> Result<(), Error> {
        let fig = LegendFig::new((7., 7.), "paramspace", false)?;
        assert_eq!(fig.axes_len(), 3);
        let fig = LegendFig::new((3., 11.), "paramspace", false)?;
        assert_eq!(fig.axes_len(), 3);
        Ok(())
    }

    #[test]
    fn unknown_string_is_degraded() -> Result<(), Error> {
        let mut fig = LegendFig::new((6., 4.), "gridspace", false)?;
        assert_eq!(fig.axes_len(), 0);
        assert!(matches!(fig.figure(Some("target/nope.png".as_ref())),
                         Err(Error::NoFigure)));
        Ok(())
    }

    #[test]
    fn short_code_list_is_degraded() -> Result<(), Error> {
        let fig = LegendFig::new((6., 4.), vec![211u16, 212], false)?;
        assert_eq!(fig.axes_len(), 0);
        Ok(())
    }

    #[test]
    fn zero_panels_is_degraded() -> Result<(), Error> {
        let fig = LegendFig::new((6., 4.), 0, false)?;
        assert_eq!(fig.axes_len(), 0);
        Ok(())
    }

    #[test]
    fn layout_conversions() {
        assert_eq!(Layout::from(3), Layout::Stack(3));
        assert_eq!(Layout::from((2, 2)), Layout::Grid(2, 2));
        assert_eq!(Layout::from("paramspace"), Layout::Paramspace);
        assert_eq!(Layout::from("anything else"), Layout::Invalid);
    }

    #[test]
    fn twin_axes_append() -> Result<(), Error> {
        let mut fig = LegendFig::new((6., 6.), 2, false)?;
        assert_eq!(fig.add_axis(0, Some("tab:red"))?, 2);
        assert_eq!(fig.add_axis(1, None)?, 3);
        assert_eq!(fig.axes_len(), 4);
        assert!(matches!(fig.add_axis(9, None), Err(Error::NoAxis(9))));
        Ok(())
    }

    #[test]
    fn float_padding_grows_both_ends() {
        let (lo, hi) = pad_float((2., 10.));
        assert!(lo < 2. && hi > 10.);
        assert!((hi - 10. * 1.005).abs() < 1e-12);
        assert!((lo - 2. * 0.995).abs() < 1e-12);
    }

    #[test]
    fn float_padding_negative_and_zero() {
        let (lo, hi) = pad_float((-10., -2.));
        assert!(lo < -10. && hi > -2.);
        assert!((lo - -10. * 1.005).abs() < 1e-12);
        assert!((hi - -2. * 0.995).abs() < 1e-12);
        assert_eq!(pad_float((0., 0.)), (-0.01, 0.01));
    }

    #[test]
    fn year_padding_widens_by_one() {
        assert_eq!(pad_year((1990., 2020.)), (1989., 2021.));
    }

    #[test]
    fn stretch_applies_to_limits() -> Result<(), Error> {
        let mut fig = LegendFig::new((6., 4.), 1, false)?;
        fig.ax(0)?.xy(&[2., 5., 10.], &[1., 3., 2.]).plot();
        let (x0, x1) = fig.ax(0)?.xlim()?;
        fig.pretty().stretch(Stretch::Float).apply()?;
        let (sx0, sx1) = fig.ax(0)?.xlim()?;
        assert!(sx0 < x0 && sx1 > x1);
        Ok(())
    }

    #[test]
    fn outside_legend_replaces_inline() -> Result<(), Error> {
        let mut fig = LegendFig::new((6., 6.), 2, true)?;
        fig.ax(0)?.xy(&[1., 2., 3.], &[1., 4., 2.]).label("a").plot();
        fig.ax(1)?.xy(&[1., 2., 3.], &[2., 1., 3.]).label("b").plot();
        fig.legend().draw()?;
        fig.legend().ncol(2).title("curves").draw_outside(0.0)?;
        assert!(fig.has_outside_legend());
        fig.pretty().large(5).apply()?;
        fig.figure(Some("target/outside_legend.png".as_ref()))?;
        assert!(Path::new("target/outside_legend.png").exists());
        Ok(())
    }

    #[test]
    fn outside_legend_needs_labels() -> Result<(), Error> {
        let mut fig = LegendFig::new((6., 4.), 1, false)?;
        fig.ax(0)?.xy(&[1., 2.], &[1., 2.]).plot();
        assert!(matches!(fig.legend().draw_outside(0.0),
                         Err(Error::NoLegendEntries)));
        assert!(!fig.has_outside_legend());
        Ok(())
    }

    #[test]
    fn inline_legend_per_axis_locations() -> Result<(), Error> {
        let mut fig = LegendFig::new((6., 6.), 2, false)?;
        fig.ax(0)?.xy(&[1., 2., 3.], &[1., 4., 2.]).label("a").plot();
        fig.ax(1)?.xy(&[1., 2., 3.], &[2., 1., 3.]).label("b").plot();
        fig.legend().locs(&["upper left", "lower right"]).draw()?;
        fig.pretty().grid(GridWhich::Minor).apply()?;
        fig.figure(Some("target/inline_legend.png".as_ref()))?;
        Ok(())
    }

    #[test]
    fn paramspace_save() -> Result<(), Error> {
        let x = [1., 2., 2.5, 3., 4., 4.5, 5.];
        let y = [2., 1., 3., 2.5, 4., 3.5, 5.];
        let mut fig = LegendFig::new((7., 7.), "paramspace", false)?;
        fig.ax(0)?.scatter(&x, &y);
        fig.ax(1)?.hist(&x, 5);
        fig.ax(2)?.hist(&y, 5);
        fig.figure(Some("target/paramspace.png".as_ref()))?;
        assert!(Path::new("target/paramspace.png").exists());
        Ok(())
    }
}
