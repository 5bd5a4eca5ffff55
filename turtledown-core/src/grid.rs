/// Fixed-size N-dimensional array addressed by coordinates.
///
/// Strides are precomputed so that the first coordinate varies fastest; for a
/// 2D grid of `[width, height]` the linear offset of `[x, y]` is
/// `x + y * width`, which matches image memory order.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseGrid<T> {
    dims: Vec<usize>,
    strides: Vec<usize>,
    data: Vec<T>,
}

impl<T: Copy> DenseGrid<T> {
    /// Create a grid with the given extent per dimension, every cell set to `fill`.
    pub fn new(dims: &[usize], fill: T) -> Self {
        let mut strides = Vec::with_capacity(dims.len());
        let mut size = 1usize;
        for &dim in dims {
            strides.push(size);
            size *= dim;
        }
        Self {
            dims: dims.to_vec(),
            strides,
            data: vec![fill; size],
        }
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Linear offset of `coords`.
    #[inline]
    pub fn index(&self, coords: &[usize]) -> usize {
        debug_assert_eq!(coords.len(), self.dims.len(), "coordinate arity");
        debug_assert!(
            coords.iter().zip(&self.dims).all(|(c, d)| c < d),
            "coordinates {coords:?} outside {:?}",
            self.dims
        );
        coords
            .iter()
            .zip(&self.strides)
            .map(|(coord, stride)| coord * stride)
            .sum()
    }

    #[inline]
    pub fn get(&self, coords: &[usize]) -> T {
        self.data[self.index(coords)]
    }

    #[inline]
    pub fn get_linear(&self, offset: usize) -> T {
        self.data[offset]
    }

    #[inline]
    pub fn set(&mut self, coords: &[usize], value: T) {
        let idx = self.index(coords);
        self.data[idx] = value;
    }

    #[inline]
    pub fn set_linear(&mut self, offset: usize, value: T) {
        self.data[offset] = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.data.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_dimensional_index_is_row_major_by_x() {
        let grid = DenseGrid::new(&[4, 3], 0u16);
        assert_eq!(grid.len(), 12);
        assert_eq!(grid.index(&[0, 0]), 0);
        assert_eq!(grid.index(&[3, 0]), 3);
        assert_eq!(grid.index(&[0, 1]), 4);
        assert_eq!(grid.index(&[3, 2]), 11);
    }

    #[test]
    fn set_then_get_for_several_dimensionalities() {
        let shapes: [&[usize]; 4] = [&[7], &[3, 5], &[2, 3, 4], &[1, 1, 1, 2]];
        for dims in shapes {
            let mut grid = DenseGrid::new(dims, u32::MAX);
            let mut coords = vec![0usize; dims.len()];
            let mut counter = 0u32;
            loop {
                grid.set(&coords, counter);
                assert_eq!(grid.get_linear(grid.index(&coords)), counter);
                counter += 1;

                // Odometer increment over all in-bounds coordinates.
                let mut axis = 0;
                while axis < dims.len() {
                    coords[axis] += 1;
                    if coords[axis] < dims[axis] {
                        break;
                    }
                    coords[axis] = 0;
                    axis += 1;
                }
                if axis == dims.len() {
                    break;
                }
            }
            assert_eq!(counter as usize, grid.len());
            assert!(grid.iter().all(|&v| v != u32::MAX), "every cell written once");
        }
    }

    #[test]
    fn set_linear_matches_coordinate_access() {
        let mut grid = DenseGrid::new(&[5, 5], 0u8);
        grid.set_linear(13, 9);
        assert_eq!(grid.get(&[3, 2]), 9);
    }
}
