use super::traits::{Containment, Overlap};

use cgmath::{BaseFloat, BaseNum, Point3};
use cgmath::prelude::*;

/// An axis-aligned bounding box
///
/// A box is finalized once `min <= max` on every axis; [`Bounds::empty`] produces an inverted box
/// which acts as the identity for [`Bounds::union`].
///
/// [`Bounds::empty`]: struct.Bounds.html#method.empty
/// [`Bounds::union`]: struct.Bounds.html#method.union
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature="serde", derive(serde_crate::Serialize, serde_crate::Deserialize))]
#[cfg_attr(feature="serde", serde(crate="serde_crate"))]
pub struct Bounds<Point> {
    pub min: Point,
    pub max: Point
}

/// The box type consumed by the tree
pub type Aabb = Bounds<Point3<f32>>;

impl<Point> Bounds<Point>
where
    Point: EuclideanSpace + Copy
{
    pub fn new(min: Point, max: Point) -> Self {
        Self{min, max}
    }

    pub fn size(self) -> Point::Diff {
        self.max - self.min
    }

    pub fn center(self) -> Point
    where
        Point::Scalar: BaseFloat
    {
        self.min.midpoint(self.max)
    }
}

impl<S> Bounds<Point3<S>>
where
    S: BaseFloat
{
    pub fn empty() -> Self {
        Self{
            min: Point3::new(S::infinity(), S::infinity(), S::infinity()),
            max: Point3::new(S::neg_infinity(), S::neg_infinity(), S::neg_infinity())}
    }

    pub fn is_empty(self) -> bool {
        self.min.x > self.max.x ||
        self.min.y > self.max.y ||
        self.min.z > self.max.z
    }

    /// The smallest box enclosing both `self` and `other`
    pub fn union(self, other: Self) -> Self {
        Self{
            min: Point3::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z)),
            max: Point3::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z))}
    }

    /// Maps `point` into the unit cube spanned by `self`
    ///
    /// Axes with zero extent map to zero instead of dividing by zero.
    pub fn normalize_point(self, point: Point3<S>) -> Point3<S> {
        let size = self.size();
        let offset = point - self.min;
        let axis = |offset: S, extent: S| {
            if extent > S::zero() {
                offset / extent
            } else {
                S::zero()
            }
        };
        Point3::new(
            axis(offset.x, size.x),
            axis(offset.y, size.y),
            axis(offset.z, size.z))
    }

    pub fn normalize_to_system(self, system_bounds: Self) -> Self {
        Bounds{
            min: system_bounds.normalize_point(self.min),
            max: system_bounds.normalize_point(self.max)
        }
    }
}

impl<T> Containment for Bounds<Point3<T>>
where
    T: BaseNum
{
    fn contains(&self, other: &Bounds<Point3<T>>) -> bool {
        self.min.x <= other.min.x &&
        self.min.y <= other.min.y &&
        self.min.z <= other.min.z &&
        self.max.x >= other.max.x &&
        self.max.y >= other.max.y &&
        self.max.z >= other.max.z
    }
}

impl<T> Overlap for Bounds<Point3<T>>
where
    T: BaseNum
{
    fn overlaps(&self, other: &Bounds<Point3<T>>) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y &&
        self.min.z <= other.max.z && self.max.z >= other.min.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_to_system() {
        let system_bounds = Bounds{
            min: Point3::new(-64f32, -64f32, -64f32),
            max: Point3::new( 64f32,  64f32,  64f32)};
        let bounds = Bounds{
            min: Point3::new(-32f32, -32f32, -32f32),
            max: Point3::new( 32f32,  32f32,  32f32)};
        let expected = Bounds{
            min: Point3::new(0.25f32, 0.25f32, 0.25f32),
            max: Point3::new(0.75f32, 0.75f32, 0.75f32)};
        assert_eq!(bounds.normalize_to_system(system_bounds), expected);
    }

    #[test]
    fn normalize_flat_axis() {
        let system_bounds = Bounds::new(
            Point3::new(0f32, 5f32, 0f32),
            Point3::new(8f32, 5f32, 4f32));
        let normalized = system_bounds.normalize_point(Point3::new(2f32, 5f32, 1f32));
        assert_eq!(normalized, Point3::new(0.25f32, 0f32, 0.25f32));
    }

    #[test]
    fn union_with_empty() {
        let a = Aabb::new(Point3::new(0f32, 1f32, 2f32), Point3::new(1f32, 2f32, 3f32));
        assert!(Aabb::empty().is_empty());
        assert_eq!(Aabb::empty().union(a), a);

        let b = Aabb::new(Point3::new(-1f32, 1.5f32, 2f32), Point3::new(0.5f32, 4f32, 2.5f32));
        let u = a.union(b);
        assert!(u.contains(&a));
        assert!(u.contains(&b));
        assert_eq!(u.min, Point3::new(-1f32, 1f32, 2f32));
        assert_eq!(u.max, Point3::new(1f32, 4f32, 3f32));
    }

    #[test]
    fn overlap_touching() {
        let a = Aabb::new(Point3::new(0f32, 0f32, 0f32), Point3::new(1f32, 1f32, 1f32));
        let b = Aabb::new(Point3::new(1f32, 0f32, 0f32), Point3::new(2f32, 1f32, 1f32));
        let c = Aabb::new(Point3::new(1.5f32, 0f32, 0f32), Point3::new(2f32, 1f32, 1f32));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }
}
