use super::*;
use proptest::prelude::*;

fn matrix_strategy() -> impl Strategy<Value = Matrix<f32>> {
    (2usize..20, 1usize..6).prop_flat_map(|(rows, cols)| {
        proptest::collection::vec(-1000.0f32..1000.0, rows * cols)
            .prop_map(move |data| Matrix::from_vec(rows, cols, data).expect("sized to fit"))
    })
}

proptest! {
    /// Every transformed value equals (x - mean) / scale for the fitted stats.
    #[test]
    fn prop_transform_is_affine(x in matrix_strategy()) {
        let mut scaler = StandardScaler::new();
        let transformed = scaler.fit_transform(&x).expect("fit_transform");

        let (n, p) = x.shape();
        for i in 0..n {
            for j in 0..p {
                let expected = (x.get(i, j) - scaler.mean()[j]) / scaler.scale()[j];
                prop_assert!((transformed.get(i, j) - expected).abs() < 1e-4);
            }
        }
    }

    /// inverse_transform undoes transform within floating tolerance.
    #[test]
    fn prop_inverse_round_trip(x in matrix_strategy()) {
        let mut scaler = StandardScaler::new();
        let transformed = scaler.fit_transform(&x).expect("fit_transform");
        let recovered = scaler.inverse_transform(&transformed).expect("inverse");

        let (n, p) = x.shape();
        for i in 0..n {
            for j in 0..p {
                let tol = 1e-3 * (1.0 + x.get(i, j).abs());
                prop_assert!((x.get(i, j) - recovered.get(i, j)).abs() < tol);
            }
        }
    }

    /// Transformed output never contains NaN or infinity, even with
    /// constant (zero-variance) columns.
    #[test]
    fn prop_output_finite(rows in 2usize..12, value in -100.0f32..100.0) {
        let x = Matrix::from_vec(rows, 2, {
            let mut data = Vec::with_capacity(rows * 2);
            for i in 0..rows {
                data.push(i as f32);
                data.push(value); // constant column
            }
            data
        }).expect("sized to fit");

        let mut scaler = StandardScaler::new();
        let transformed = scaler.fit_transform(&x).expect("fit_transform");
        for v in transformed.as_slice() {
            prop_assert!(v.is_finite());
        }
    }
}
