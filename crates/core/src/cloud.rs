use crate::geometry::{Vec2, Vec3};

/// Struct-of-arrays point cloud.
///
/// Coordinates are stored column-wise; the optional metadata channels
/// (`colors`, `intensity`, `classification`) are either absent or hold exactly
/// one entry per point. Every subsetting operation carries the channels along.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub z: Vec<f32>,
    pub colors: Option<Colors>,
    pub intensity: Option<Vec<f32>>,
    /// ASPRS LAS classification code per point (2 = ground, 9 = water, ...).
    pub classification: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Colors {
    pub r: Vec<u8>,
    pub g: Vec<u8>,
    pub b: Vec<u8>,
}

impl Colors {
    fn select(&self, indices: &[usize]) -> Self {
        Self {
            r: indices.iter().map(|&idx| self.r[idx]).collect(),
            g: indices.iter().map(|&idx| self.g[idx]).collect(),
            b: indices.iter().map(|&idx| self.b[idx]).collect(),
        }
    }

    fn append(&mut self, other: &Colors) {
        self.r.extend_from_slice(&other.r);
        self.g.extend_from_slice(&other.g);
        self.b.extend_from_slice(&other.b);
    }
}

impl PointCloud {
    pub fn new() -> Self {
        Self {
            x: Vec::new(),
            y: Vec::new(),
            z: Vec::new(),
            colors: None,
            intensity: None,
            classification: None,
        }
    }

    pub fn from_xyz(x: Vec<f32>, y: Vec<f32>, z: Vec<f32>) -> Self {
        assert_eq!(x.len(), y.len(), "x and y must have same length");
        assert_eq!(x.len(), z.len(), "x and z must have same length");

        Self {
            x,
            y,
            z,
            colors: None,
            intensity: None,
            classification: None,
        }
    }

    pub fn from_points(points: &[Vec3]) -> Self {
        let mut x = Vec::with_capacity(points.len());
        let mut y = Vec::with_capacity(points.len());
        let mut z = Vec::with_capacity(points.len());
        for p in points {
            x.push(p[0]);
            y.push(p[1]);
            z.push(p[2]);
        }
        Self::from_xyz(x, y, z)
    }

    /// Attaches a classification channel.
    ///
    /// # Panics
    ///
    /// Panics if `classes.len()` differs from the number of points.
    pub fn with_classification(mut self, classes: Vec<u8>) -> Self {
        assert_eq!(
            classes.len(),
            self.len(),
            "classification must have one entry per point"
        );
        self.classification = Some(classes);
        self
    }

    pub fn len(&self) -> usize {
        debug_assert_eq!(self.x.len(), self.y.len());
        debug_assert_eq!(self.x.len(), self.z.len());
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn point(&self, i: usize) -> Vec3 {
        [self.x[i], self.y[i], self.z[i]]
    }

    pub fn iter_points(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.x
            .iter()
            .zip(&self.y)
            .zip(&self.z)
            .map(|((x, y), z)| [*x, *y, *z])
    }

    /// Projects the given points onto the (x, y) plane, in index order.
    pub fn project_xy(&self, indices: &[usize]) -> Vec<Vec2> {
        indices.iter().map(|&i| [self.x[i], self.y[i]]).collect()
    }

    /// Copies the points at `indices` (in that order) into a new cloud.
    ///
    /// # Panics
    ///
    /// Panics if any index is out of bounds.
    pub fn select(&self, indices: &[usize]) -> Self {
        let mut x = Vec::with_capacity(indices.len());
        let mut y = Vec::with_capacity(indices.len());
        let mut z = Vec::with_capacity(indices.len());

        for &idx in indices {
            assert!(idx < self.len(), "index out of bounds in select");
            x.push(self.x[idx]);
            y.push(self.y[idx]);
            z.push(self.z[idx]);
        }

        let colors = self.colors.as_ref().map(|c| c.select(indices));

        let intensity = self
            .intensity
            .as_ref()
            .map(|it| indices.iter().map(|&idx| it[idx]).collect());

        let classification = self
            .classification
            .as_ref()
            .map(|cls| indices.iter().map(|&idx| cls[idx]).collect());

        Self {
            x,
            y,
            z,
            colors,
            intensity,
            classification,
        }
    }

    /// Appends every point of `other` to the end of this cloud.
    ///
    /// An empty cloud adopts whichever metadata channels `other` carries.
    /// Otherwise a channel survives only if both clouds have it, so the
    /// one-entry-per-point rule always holds.
    pub fn append(&mut self, other: &PointCloud) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = other.clone();
            return;
        }

        self.x.extend_from_slice(&other.x);
        self.y.extend_from_slice(&other.y);
        self.z.extend_from_slice(&other.z);

        self.colors = match (self.colors.take(), &other.colors) {
            (Some(mut mine), Some(theirs)) => {
                mine.append(theirs);
                Some(mine)
            }
            _ => None,
        };
        self.intensity = match (self.intensity.take(), &other.intensity) {
            (Some(mut mine), Some(theirs)) => {
                mine.extend_from_slice(theirs);
                Some(mine)
            }
            _ => None,
        };
        self.classification = match (self.classification.take(), &other.classification) {
            (Some(mut mine), Some(theirs)) => {
                mine.extend_from_slice(theirs);
                Some(mine)
            }
            _ => None,
        };
    }

    pub fn to_array(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.len() * 3);
        for p in self.iter_points() {
            out.extend_from_slice(&p);
        }
        out
    }
}

impl Default for PointCloud {
    fn default() -> Self {
        Self::new()
    }
}
