// src/basis.rs - Orthonormal rotation frame from a single bone direction
use crate::error::DegenerateGeometry;
use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};

const EPSILON: f64 = 1e-9;

/// Three mutually orthogonal axes, each of the builder's target length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Basis {
    pub x_axis: Vector3<f64>,
    pub y_axis: Vector3<f64>,
    pub z_axis: Vector3<f64>,
}

impl Basis {
    /// Axes as matrix columns in x, y, z order.
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::from_columns(&[self.x_axis, self.y_axis, self.z_axis])
    }

    pub fn rotation(&self) -> UnitQuaternion<f64> {
        let m = Matrix3::from_columns(&[
            self.x_axis.normalize(),
            self.y_axis.normalize(),
            self.z_axis.normalize(),
        ]);
        UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(m))
    }
}

/// Builds a basis whose z axis follows a bone, using a fixed pole along +z in
/// place of an up vector. Bones parallel to the pole have no defined twist and
/// are reported as degenerate.
#[derive(Debug, Clone, Copy)]
pub struct BasisBuilder {
    length: f64,
}

impl Default for BasisBuilder {
    fn default() -> Self {
        Self { length: 1.0 }
    }
}

impl BasisBuilder {
    pub fn new(length: f64) -> Self {
        Self { length }
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn build(&self, direction: &Vector3<f64>) -> Result<Basis, DegenerateGeometry> {
        if !direction.iter().all(|c| c.is_finite()) {
            return Err(DegenerateGeometry::NonFinite);
        }
        let norm = direction.norm();
        if norm < EPSILON {
            return Err(DegenerateGeometry::ZeroLength);
        }
        let v = direction * (self.length / norm);

        let pole = Vector3::new(0.0, 0.0, self.length);
        let cross1 = pole.cross(&v);
        let cross1_norm = cross1.norm();
        if cross1_norm < EPSILON * self.length * self.length {
            return Err(DegenerateGeometry::ParallelToPole);
        }
        let cross1 = cross1 * (self.length / cross1_norm);

        let cross2 = cross1.cross(&v);
        let cross2 = cross2 * (self.length / cross2.norm());

        // Column order (cross2, cross1, v) keeps the frame right-handed.
        Ok(Basis {
            x_axis: cross2,
            y_axis: cross1,
            z_axis: v,
        })
    }
}
