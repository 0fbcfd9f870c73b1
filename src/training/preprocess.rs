//! Shared preprocessing: standard scaling of numeric features and one-hot
//! encoding of categorical features.
//!
//! The [`Preprocessor`] is fitted on the training partition only and then
//! applied unchanged to the test partition and to prediction requests. The
//! output matrix holds the scaled numeric columns first, then the indicator
//! columns, in configuration order.

use crate::error::{AirfareError, Result};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// `(x - mean) / std` per numeric column, with the population standard
/// deviation. A constant column gets a scale of 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    columns: Vec<String>,
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    /// # Errors
    ///
    /// Fails on absent columns, non-numeric columns and null values.
    pub fn fit(df: &DataFrame, columns: &[String]) -> Result<Self> {
        let mut means = Vec::with_capacity(columns.len());
        let mut scales = Vec::with_capacity(columns.len());

        for name in columns {
            let values = numeric_values(df, name)?;
            let n = values.len().max(1) as f64;
            let mean = values.iter().sum::<f64>() / n;
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = variance.sqrt();
            means.push(mean);
            scales.push(if std > 0.0 && std.is_finite() { std } else { 1.0 });
        }

        Ok(Self {
            columns: columns.to_vec(),
            means,
            scales,
        })
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    fn write(&self, df: &DataFrame, out: &mut Array2<f64>, offset: usize) -> Result<()> {
        for (j, name) in self.columns.iter().enumerate() {
            let values = numeric_values(df, name)?;
            let (mean, scale) = (self.means[j], self.scales[j]);
            for (i, value) in values.into_iter().enumerate() {
                out[[i, offset + j]] = (value - mean) / scale;
            }
        }
        Ok(())
    }
}

/// One indicator column per category seen during fitting.
///
/// Categories are sorted. A value not seen during fitting (or a null)
/// encodes as all zeros for that feature. With `drop_first`, the first
/// category of each feature gets no indicator column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    columns: Vec<String>,
    categories: Vec<Vec<String>>,
    drop_first: bool,
}

impl OneHotEncoder {
    /// # Errors
    ///
    /// Fails on absent columns.
    pub fn fit(df: &DataFrame, columns: &[String], drop_first: bool) -> Result<Self> {
        let mut categories = Vec::with_capacity(columns.len());
        for name in columns {
            let mut seen: Vec<String> = category_values(df, name)?
                .into_iter()
                .flatten()
                .collect();
            seen.sort();
            seen.dedup();
            categories.push(seen);
        }
        Ok(Self {
            columns: columns.to_vec(),
            categories,
            drop_first,
        })
    }

    pub fn categories(&self) -> &[Vec<String>] {
        &self.categories
    }

    fn encoded(&self, feature: usize) -> &[String] {
        let categories = &self.categories[feature];
        if self.drop_first && !categories.is_empty() {
            &categories[1..]
        } else {
            categories
        }
    }

    pub fn width(&self) -> usize {
        (0..self.columns.len()).map(|f| self.encoded(f).len()).sum()
    }

    pub fn feature_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.width());
        for (f, column) in self.columns.iter().enumerate() {
            for category in self.encoded(f) {
                names.push(format!("{column}_{category}"));
            }
        }
        names
    }

    /// Returns the number of values that matched no known category.
    fn write(&self, df: &DataFrame, out: &mut Array2<f64>, offset: usize) -> Result<usize> {
        let mut unknown = 0;
        let mut base = offset;
        for (f, name) in self.columns.iter().enumerate() {
            let encoded = self.encoded(f);
            let known = &self.categories[f];
            for (i, value) in category_values(df, name)?.into_iter().enumerate() {
                let Some(value) = value else {
                    unknown += 1;
                    continue;
                };
                if let Ok(pos) = encoded.binary_search(&value) {
                    out[[i, base + pos]] = 1.0;
                } else if known.binary_search(&value).is_err() {
                    unknown += 1;
                }
            }
            base += encoded.len();
        }
        Ok(unknown)
    }
}

/// Fitted scaler plus fitted encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    scaler: StandardScaler,
    encoder: OneHotEncoder,
}

impl Preprocessor {
    /// Fit both transformers on `df`.
    ///
    /// # Errors
    ///
    /// Fails when a configured column is absent, or a numeric column holds
    /// nulls or non-numeric values.
    pub fn fit(
        df: &DataFrame,
        numerical: &[String],
        categorical: &[String],
        drop_first: bool,
    ) -> Result<Self> {
        Ok(Self {
            scaler: StandardScaler::fit(df, numerical)?,
            encoder: OneHotEncoder::fit(df, categorical, drop_first)?,
        })
    }

    pub fn n_features(&self) -> usize {
        self.scaler.columns.len() + self.encoder.width()
    }

    pub fn feature_names(&self) -> Vec<String> {
        let mut names = self.scaler.columns.clone();
        names.extend(self.encoder.feature_names());
        names
    }

    /// Build the model matrix for `df`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Preprocessor::fit`].
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let mut out = Array2::zeros((df.height(), self.n_features()));
        self.scaler.write(df, &mut out, 0)?;
        let unknown = self
            .encoder
            .write(df, &mut out, self.scaler.columns.len())?;
        if unknown > 0 {
            tracing::warn!("{unknown} categorical values were not seen during fitting");
        }
        Ok(out)
    }
}

fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| AirfareError::missing_column("preprocess", name))?;
    if column.dtype() == &DataType::String {
        return Err(AirfareError::Type {
            key: name.to_owned(),
            message: "numeric feature holds text".to_owned(),
        });
    }
    let values = column.as_materialized_series().cast(&DataType::Float64)?;
    let values = values.f64()?;
    if values.null_count() > 0 {
        return Err(AirfareError::DataProcessing(format!(
            "numeric feature '{name}' has {} null values",
            values.null_count()
        )));
    }
    Ok(values.into_no_null_iter().collect())
}

fn category_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| AirfareError::missing_column("preprocess", name))?;
    let values = column.as_materialized_series().cast(&DataType::String)?;
    Ok(values
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_owned))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    fn train() -> Result<DataFrame> {
        Ok(DataFrame::new(vec![
            Column::from(Series::new("duration".into(), vec![1.0, 2.0, 3.0, 4.0])),
            Column::from(Series::new("stops".into(), vec![1i64, 1, 1, 1])),
            Column::from(Series::new(
                "airline".into(),
                vec!["Vistara", "Air_India", "Vistara", "Indigo"],
            )),
        ])?)
    }

    #[test]
    fn test_scaler_uses_population_std() -> Result<()> {
        let scaler = StandardScaler::fit(&train()?, &names(&["duration", "stops"]))?;
        assert_eq!(scaler.means(), &[2.5, 1.0]);
        assert!((scaler.scales()[0] - 1.25f64.sqrt()).abs() < 1e-12);
        // Constant column
        assert_eq!(scaler.scales()[1], 1.0);
        Ok(())
    }

    #[test]
    fn test_categories_are_sorted() -> Result<()> {
        let encoder = OneHotEncoder::fit(&train()?, &names(&["airline"]), false)?;
        assert_eq!(
            encoder.categories()[0],
            names(&["Air_India", "Indigo", "Vistara"])
        );
        assert_eq!(
            encoder.feature_names(),
            names(&["airline_Air_India", "airline_Indigo", "airline_Vistara"])
        );
        Ok(())
    }

    #[test]
    fn test_unseen_category_encodes_as_zeros() -> Result<()> {
        let pre = Preprocessor::fit(
            &train()?,
            &names(&["duration"]),
            &names(&["airline"]),
            false,
        )?;
        let request = DataFrame::new(vec![
            Column::from(Series::new("duration".into(), vec![2.5, 2.5])),
            Column::from(Series::new("airline".into(), vec!["SpiceJet", "Indigo"])),
        ])?;
        let x = pre.transform(&request)?;

        assert_eq!(x.shape(), &[2, 4]);
        assert_eq!(x.row(0).to_vec(), vec![0.0, 0.0, 0.0, 0.0]);
        assert_eq!(x.row(1).to_vec(), vec![0.0, 0.0, 1.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_drop_first_removes_one_indicator() -> Result<()> {
        let pre = Preprocessor::fit(&train()?, &[], &names(&["airline"]), true)?;
        assert_eq!(pre.n_features(), 2);
        assert_eq!(pre.feature_names(), names(&["airline_Indigo", "airline_Vistara"]));
        let x = pre.transform(&train()?)?;
        // Air_India is the dropped reference category
        assert_eq!(x.row(1).to_vec(), vec![0.0, 0.0]);
        assert_eq!(x.row(0).to_vec(), vec![0.0, 1.0]);
        Ok(())
    }

    #[test]
    fn test_numeric_nulls_rejected() -> Result<()> {
        let df = DataFrame::new(vec![Column::from(Series::new(
            "duration".into(),
            vec![Some(1.0), None],
        ))])?;
        let err = StandardScaler::fit(&df, &names(&["duration"])).unwrap_err();
        assert!(matches!(err, AirfareError::DataProcessing(_)));
        Ok(())
    }

    #[test]
    fn test_missing_feature_column() -> Result<()> {
        let err = Preprocessor::fit(&train()?, &names(&["days_left"]), &[], false).unwrap_err();
        assert!(matches!(err, AirfareError::MissingColumn { .. }));
        Ok(())
    }
}
