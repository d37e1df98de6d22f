use super::super::types::*;
use crate::category::core::{Dtype, Shape};
use crate::interpreter::backend::{Backend, BackendError, BackendTensorOps};
use ndarray::{ArcArray, ArrayD, Axis, IxDyn, Zip};
use std::fmt::Debug;

#[derive(Clone, Debug, PartialEq)]
pub struct NdArrayBackend;

// We can't really handle HKTs properly in rust, so the ndarray backend suffers through some
// "double tagging" of values. Panics in the unwrap_<dtype> methods are always programmer errors.
#[derive(Clone, Debug, PartialEq)]
pub enum TaggedArrayD {
    F32(ArcArray<f32, IxDyn>),
    U32(ArcArray<u32, IxDyn>),
}

impl TaggedArrayD {
    fn unwrap_f32(self) -> ArrayD<f32> {
        match self {
            TaggedArrayD::F32(x) => x.into_owned(),
            _ => panic!("Not f32 array"),
        }
    }

    fn unwrap_u32(self) -> ArrayD<u32> {
        match self {
            TaggedArrayD::U32(x) => x.into_owned(),
            _ => panic!("Not u32 array"),
        }
    }
}

fn from_f32(x: ArrayD<f32>) -> TaggedTensor<NdArrayBackend> {
    TaggedTensor::F32([TaggedArrayD::F32(x.into_shared())])
}

fn from_u32(x: ArrayD<u32>) -> TaggedTensor<NdArrayBackend> {
    TaggedTensor::U32([TaggedArrayD::U32(x.into_shared())])
}

impl Backend for NdArrayBackend {
    type BackendTensor = TaggedArrayD;

    fn to_vec(&self, x: TaggedTensor<Self>) -> TaggedVec {
        match x {
            TaggedTensor::F32([x]) => TaggedVec::F32(x.unwrap_f32().iter().copied().collect()),
            TaggedTensor::U32([x]) => TaggedVec::U32(x.unwrap_u32().iter().copied().collect()),
        }
    }

    fn ndarray_from_vec_f32(
        &self,
        data: Vec<f32>,
        shape: Shape,
    ) -> Result<TaggedTensor<Self>, BackendError> {
        let arr = ArrayD::from_shape_vec(IxDyn(&shape.0), data)
            .map_err(|_| BackendError::ShapeError)?;
        Ok(from_f32(arr))
    }

    fn ndarray_from_vec_u32(
        &self,
        data: Vec<u32>,
        shape: Shape,
    ) -> Result<TaggedTensor<Self>, BackendError> {
        let arr = ArrayD::from_shape_vec(IxDyn(&shape.0), data)
            .map_err(|_| BackendError::ShapeError)?;
        Ok(from_u32(arr))
    }

    fn cast(&self, x: TaggedTensor<Self>, target_dtype: Dtype) -> TaggedTensor<Self> {
        match (x, target_dtype) {
            (TaggedTensor::F32([arr]), Dtype::U32) => {
                from_u32(arr.unwrap_f32().mapv(|v| v as u32))
            }
            (TaggedTensor::U32([arr]), Dtype::F32) => {
                from_f32(arr.unwrap_u32().mapv(|v| v as f32))
            }
            (x @ TaggedTensor::F32(_), Dtype::F32) => x,
            (x @ TaggedTensor::U32(_), Dtype::U32) => x,
        }
    }

    fn matmul(&self, lhs: TaggedTensorTuple<Self, 2>) -> TaggedTensor<Self> {
        use TaggedTensorTuple::*;
        match lhs {
            F32([x, y]) => from_f32(Self::batched_matmul(x.unwrap_f32(), y.unwrap_f32())),
            U32([x, y]) => from_u32(Self::batched_matmul(x.unwrap_u32(), y.unwrap_u32())),
        }
    }

    fn add(&self, lhs: TaggedTensorTuple<Self, 2>) -> TaggedTensor<Self> {
        use TaggedTensorTuple::*;
        match lhs {
            F32([x, y]) => from_f32(x.unwrap_f32() + y.unwrap_f32()),
            U32([x, y]) => from_u32(zip_with(x.unwrap_u32(), y.unwrap_u32(), u32::wrapping_add)),
        }
    }

    fn sub(&self, lhs: TaggedTensorTuple<Self, 2>) -> TaggedTensor<Self> {
        use TaggedTensorTuple::*;
        match lhs {
            F32([x, y]) => from_f32(x.unwrap_f32() - y.unwrap_f32()),
            U32([x, y]) => from_u32(zip_with(x.unwrap_u32(), y.unwrap_u32(), u32::wrapping_sub)),
        }
    }

    fn mul(&self, lhs: TaggedTensorTuple<Self, 2>) -> TaggedTensor<Self> {
        use TaggedTensorTuple::*;
        match lhs {
            F32([x, y]) => from_f32(x.unwrap_f32() * y.unwrap_f32()),
            U32([x, y]) => from_u32(zip_with(x.unwrap_u32(), y.unwrap_u32(), u32::wrapping_mul)),
        }
    }

    fn div(&self, lhs: TaggedTensorTuple<Self, 2>) -> TaggedTensor<Self> {
        use TaggedTensorTuple::*;
        match lhs {
            F32([x, y]) => from_f32(x.unwrap_f32() / y.unwrap_f32()),
            U32([x, y]) => from_u32(Self::div_u32(x.unwrap_u32(), y.unwrap_u32())),
        }
    }

    fn pow(&self, lhs: TaggedTensorTuple<Self, 2>) -> TaggedTensor<Self> {
        use TaggedTensorTuple::*;
        match lhs {
            F32([x, y]) => from_f32(zip_with(x.unwrap_f32(), y.unwrap_f32(), f32::powf)),
            U32([x, y]) => from_u32(zip_with(x.unwrap_u32(), y.unwrap_u32(), u32::wrapping_pow)),
        }
    }

    fn lt(&self, lhs: TaggedTensorTuple<Self, 2>) -> TaggedTensor<Self> {
        use TaggedTensorTuple::*;
        match lhs {
            F32([x, y]) => from_f32(zip_with(x.unwrap_f32(), y.unwrap_f32(), |a, b| {
                (a < b) as u32 as f32
            })),
            U32([x, y]) => from_u32(zip_with(x.unwrap_u32(), y.unwrap_u32(), |a, b| {
                (a < b) as u32
            })),
        }
    }

    fn eq(&self, lhs: TaggedTensorTuple<Self, 2>) -> TaggedTensor<Self> {
        use TaggedTensorTuple::*;
        match lhs {
            F32([x, y]) => from_f32(zip_with(x.unwrap_f32(), y.unwrap_f32(), |a, b| {
                (a == b) as u32 as f32
            })),
            U32([x, y]) => from_u32(zip_with(x.unwrap_u32(), y.unwrap_u32(), |a, b| {
                (a == b) as u32
            })),
        }
    }

    fn neg(&self, x: TaggedTensor<Self>) -> TaggedTensor<Self> {
        use TaggedTensorTuple::*;
        match x {
            F32([arr]) => from_f32(arr.unwrap_f32().mapv(|v| -v)),
            // negation of unsigned values wraps
            U32([arr]) => from_u32(arr.unwrap_u32().mapv(u32::wrapping_neg)),
        }
    }

    fn sin(&self, x: TaggedTensor<Self>) -> TaggedTensor<Self> {
        from_f32(Self::float_only(x, "sin").mapv(f32::sin))
    }

    fn cos(&self, x: TaggedTensor<Self>) -> TaggedTensor<Self> {
        from_f32(Self::float_only(x, "cos").mapv(f32::cos))
    }

    fn exp(&self, x: TaggedTensor<Self>) -> TaggedTensor<Self> {
        from_f32(Self::float_only(x, "exp").mapv(f32::exp))
    }

    fn log(&self, x: TaggedTensor<Self>) -> TaggedTensor<Self> {
        from_f32(Self::float_only(x, "log").mapv(f32::ln))
    }

    fn sqrt(&self, x: TaggedTensor<Self>) -> TaggedTensor<Self> {
        from_f32(Self::float_only(x, "sqrt").mapv(f32::sqrt))
    }

    fn max(&self, x: TaggedTensor<Self>) -> TaggedTensor<Self> {
        use TaggedTensorTuple::*;
        match x {
            F32([arr]) => from_f32(Self::max_f32(arr.unwrap_f32())),
            U32([arr]) => from_u32(Self::max_u32(arr.unwrap_u32())),
        }
    }

    fn sum(&self, x: TaggedTensor<Self>) -> TaggedTensor<Self> {
        use TaggedTensorTuple::*;
        match x {
            F32([arr]) => from_f32(Self::sum(arr.unwrap_f32())),
            U32([arr]) => from_u32(Self::sum(arr.unwrap_u32())),
        }
    }

    fn broadcast(&self, x: TaggedTensor<Self>, shape: Shape) -> TaggedTensor<Self> {
        use TaggedTensorTuple::*;
        match x {
            F32([arr]) => from_f32(Self::broadcast_ndarray(arr.unwrap_f32(), shape)),
            U32([arr]) => from_u32(Self::broadcast_ndarray(arr.unwrap_u32(), shape)),
        }
    }

    fn reshape(&self, x: TaggedTensor<Self>, new_shape: Shape) -> TaggedTensor<Self> {
        use TaggedTensorTuple::*;
        match x {
            F32([arr]) => from_f32(Self::reshape_ndarray(arr.unwrap_f32(), new_shape)),
            U32([arr]) => from_u32(Self::reshape_ndarray(arr.unwrap_u32(), new_shape)),
        }
    }

    fn index(
        &self,
        x: TaggedTensor<Self>,
        dim: usize,
        indices: TaggedTensor<Self>,
    ) -> TaggedTensor<Self> {
        use TaggedTensorTuple::*;
        match (x, indices) {
            (F32([arr]), U32([indices])) => from_f32(Self::index_ndarray(
                arr.unwrap_f32(),
                dim,
                indices.unwrap_u32(),
            )),
            (U32([arr]), U32([indices])) => from_u32(Self::index_ndarray(
                arr.unwrap_u32(),
                dim,
                indices.unwrap_u32(),
            )),
            _ => panic!("Invalid input types for indexing"),
        }
    }
}

// elementwise map of two same-shape arrays
fn zip_with<D: Copy, E>(x: ArrayD<D>, y: ArrayD<D>, f: impl Fn(D, D) -> E) -> ArrayD<E> {
    Zip::from(&x).and(&y).map_collect(|&a, &b| f(a, b))
}

impl NdArrayBackend {
    fn float_only(x: TaggedTensor<Self>, name: &str) -> ArrayD<f32> {
        match x {
            TaggedTensor::F32([arr]) => arr.unwrap_f32(),
            _ => panic!("Invalid input types for {name}"),
        }
    }

    fn div_u32(x: ArrayD<u32>, y: ArrayD<u32>) -> ArrayD<u32> {
        zip_with(x, y, |a, b| a.checked_div(b).unwrap_or(u32::MAX))
    }

    fn reshape_ndarray<D: Copy + Send + Sync + Debug>(
        arr: ArrayD<D>,
        new_shape: Shape,
    ) -> ArrayD<D> {
        // element order is row-major regardless of the input's memory layout
        let data: Vec<D> = arr.iter().copied().collect();
        ArrayD::from_shape_vec(IxDyn(&new_shape.0), data)
            .expect("reshape: sizes are checked by the interpreter")
    }

    fn broadcast_ndarray<D: Copy + Send + Sync + Debug>(arr: ArrayD<D>, shape: Shape) -> ArrayD<D> {
        arr.broadcast(IxDyn(&shape.0))
            .expect("broadcast: shapes are checked by the interpreter")
            .to_owned()
    }

    fn index_ndarray<D: Copy + Default + Send + Sync + Debug>(
        arr: ArrayD<D>,
        dim: usize,
        indices: ArrayD<u32>,
    ) -> ArrayD<D> {
        let size = arr.shape()[dim];
        if size == 0 {
            let mut dims = arr.shape().to_vec();
            dims[dim] = indices.len();
            return ArrayD::from_elem(IxDyn(&dims), D::default());
        }

        let idx = indices
            .iter()
            .map(|&i| (i as usize).min(size - 1))
            .collect::<Vec<_>>();
        arr.select(Axis(dim), &idx)
    }

    fn max_f32(x: ArrayD<f32>) -> ArrayD<f32> {
        // across the last dimension
        let axis = x.ndim() - 1;
        x.fold_axis(Axis(axis), f32::MIN, |acc, &x| acc.max(x))
            .insert_axis(Axis(axis))
    }

    fn max_u32(x: ArrayD<u32>) -> ArrayD<u32> {
        // across the last dimension
        let axis = x.ndim() - 1;
        x.fold_axis(Axis(axis), u32::MIN, |acc, x| *acc.max(x))
            .insert_axis(Axis(axis))
    }

    fn sum<D>(x: ArrayD<D>) -> ArrayD<D>
    where
        D: ndarray::LinalgScalar,
    {
        // across the last dimension
        let axis = x.ndim() - 1;
        x.sum_axis(Axis(axis)).insert_axis(Axis(axis))
    }

    fn matmul_generic<D>(lhs: ArrayD<D>, rhs: ArrayD<D>) -> ArrayD<D>
    where
        D: ndarray::LinalgScalar + Send + Sync + Debug,
    {
        // ndarray needs to know we have 2d arrays statically to use .dot()
        let lhs_2d = lhs
            .into_dimensionality::<ndarray::Ix2>()
            .expect("matmul: lhs must be rank 2");
        let rhs_2d = rhs
            .into_dimensionality::<ndarray::Ix2>()
            .expect("matmul: rhs must be rank 2");
        lhs_2d.dot(&rhs_2d).into_dyn()
    }

    /// Multiply `(..., M, K) × (..., K, N)` arrays with identical batch dimensions.
    pub fn batched_matmul<D>(lhs: ArrayD<D>, rhs: ArrayD<D>) -> ArrayD<D>
    where
        D: ndarray::LinalgScalar + Send + Sync + Debug,
    {
        if lhs.ndim() == 2 && rhs.ndim() == 2 {
            return Self::matmul_generic(lhs, rhs);
        }

        let lhs_shape = lhs.shape().to_vec();
        let rhs_shape = rhs.shape().to_vec();
        let batch_dims = &lhs_shape[..lhs_shape.len() - 2];
        let (m, k) = (lhs_shape[lhs_shape.len() - 2], lhs_shape[lhs_shape.len() - 1]);
        let n = rhs_shape[rhs_shape.len() - 1];
        let batch_size: usize = batch_dims.iter().product();

        let lhs_reshaped = Self::reshape_ndarray(lhs, Shape(vec![batch_size, m, k]));
        let rhs_reshaped = Self::reshape_ndarray(rhs, Shape(vec![batch_size, k, n]));

        let mut result_data = Vec::with_capacity(batch_size * m * n);
        for b in 0..batch_size {
            let lhs_batch = lhs_reshaped.index_axis(Axis(0), b).to_owned();
            let rhs_batch = rhs_reshaped.index_axis(Axis(0), b).to_owned();
            let batch_result = Self::matmul_generic(lhs_batch, rhs_batch);
            result_data.extend(batch_result.iter().copied());
        }

        let mut result_shape = batch_dims.to_vec();
        result_shape.push(m);
        result_shape.push(n);
        ArrayD::from_shape_vec(IxDyn(&result_shape), result_data)
            .expect("batched_matmul: result size is batch * m * n")
    }
}

impl BackendTensorOps for TaggedArrayD {
    fn shape(&self) -> Shape {
        Shape(
            match self {
                TaggedArrayD::F32(x) => x.shape(),
                TaggedArrayD::U32(x) => x.shape(),
            }
            .to_vec(),
        )
    }
}
