use crate::error::ProtocolViolation;
use rand::Rng;
use std::fmt;

/// Outcome of one die roll, always within 1..=6.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Face(u8);

impl Face {
    pub const ALL: [Face; 6] = [Face(1), Face(2), Face(3), Face(4), Face(5), Face(6)];

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Face {
    type Error = ProtocolViolation;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1..=6 => Ok(Face(value as u8)),
            other => Err(ProtocolViolation::FaceOutOfRange(other)),
        }
    }
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cube orientation in whole degrees, applied as `rotateX · rotateY · rotateZ`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RotationFrame {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl RotationFrame {
    pub const fn new(x: i16, y: i16, z: i16) -> Self {
        Self { x, y, z }
    }

    /// Orientation that shows `face` to the viewer once a roll settles.
    pub const fn resting(face: Face) -> Self {
        match face.0 {
            2 => Self::new(0, 180, 0),
            3 => Self::new(0, -90, 0),
            4 => Self::new(0, 90, 0),
            5 => Self::new(-90, 0, 0),
            6 => Self::new(90, 0, 0),
            _ => Self::new(0, 0, 0),
        }
    }

    /// The face whose outward normal points most directly at the viewer.
    ///
    /// Uses the CSS cube layout: 1 front, 2 back, 3 right, 4 left, 5 top,
    /// 6 bottom, with the y axis pointing down and z towards the viewer.
    pub fn facing_face(&self) -> Face {
        const NORMALS: [(u8, [f64; 3]); 6] = [
            (1, [0.0, 0.0, 1.0]),
            (2, [0.0, 0.0, -1.0]),
            (3, [1.0, 0.0, 0.0]),
            (4, [-1.0, 0.0, 0.0]),
            (5, [0.0, -1.0, 0.0]),
            (6, [0.0, 1.0, 0.0]),
        ];
        let m = mat_mul(
            &mat_mul(&rotate_x(self.x), &rotate_y(self.y)),
            &rotate_z(self.z),
        );
        let towards_viewer = m[2];
        let mut best = (1u8, f64::MIN);
        for (face, normal) in NORMALS {
            let depth = towards_viewer[0] * normal[0]
                + towards_viewer[1] * normal[1]
                + towards_viewer[2] * normal[2];
            if depth > best.1 {
                best = (face, depth);
            }
        }
        Face(best.0)
    }
}

impl fmt::Display for RotationFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}° y{}° z{}°", self.x, self.y, self.z)
    }
}

type Mat3 = [[f64; 3]; 3];

fn rotate_x(deg: i16) -> Mat3 {
    let (s, c) = f64::from(deg).to_radians().sin_cos();
    [[1.0, 0.0, 0.0], [0.0, c, -s], [0.0, s, c]]
}

fn rotate_y(deg: i16) -> Mat3 {
    let (s, c) = f64::from(deg).to_radians().sin_cos();
    [[c, 0.0, s], [0.0, 1.0, 0.0], [-s, 0.0, c]]
}

fn rotate_z(deg: i16) -> Mat3 {
    let (s, c) = f64::from(deg).to_radians().sin_cos();
    [[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]]
}

fn mat_mul(a: &Mat3, b: &Mat3) -> Mat3 {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = (0..3).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

/// A tumble: random intermediate orientations, then the resting one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RotationSequence {
    pub frames: Vec<RotationFrame>,
    pub final_frame: RotationFrame,
}

/// Samples a tumble of `frame_count` frames that settles on `target`.
pub fn generate<R: Rng + ?Sized>(
    target: Face,
    frame_count: usize,
    rng: &mut R,
) -> RotationSequence {
    let frames = (0..frame_count)
        .map(|_| {
            RotationFrame::new(
                rng.random_range(-90..=90),
                rng.random_range(-180..=180),
                rng.random_range(-180..=180),
            )
        })
        .collect();
    RotationSequence {
        frames,
        final_frame: RotationFrame::resting(target),
    }
}
