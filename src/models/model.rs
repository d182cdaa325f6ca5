//! Composite model evaluation.
//!
//! A `CompositeModel` is an ordered sum of [`Shape`]s. Its flat parameter vector
//! is the concatenation of each component's slice, in component order, which is
//! also the order of the matching [`Parameters`] entries.

use crate::domain::{Component, ParamId};
use crate::models::shapes::Shape;

/// Anything the optimizer can fit: `f(x; p)` over a fixed parameter vector.
pub trait FitModel {
    fn n_params(&self) -> usize;

    fn eval(&self, x: f64, params: &[f64]) -> f64;

    /// Evaluate over a grid into `out`.
    fn eval_into(&self, xs: &[f64], params: &[f64], out: &mut [f64]) {
        for (o, &x) in out.iter_mut().zip(xs) {
            *o = self.eval(x, params);
        }
    }
}

/// One additive term and where its parameters live in the flat vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentSlot {
    pub component: Component,
    pub shape: Shape,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompositeModel {
    slots: Vec<ComponentSlot>,
    n_params: usize,
}

impl CompositeModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a component; returns its parameter offset.
    pub fn push(&mut self, component: Component, shape: Shape) -> usize {
        let offset = self.n_params;
        self.slots.push(ComponentSlot {
            component,
            shape,
            offset,
        });
        self.n_params += shape.param_count();
        offset
    }

    pub fn slots(&self) -> &[ComponentSlot] {
        &self.slots
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl FitModel for CompositeModel {
    fn n_params(&self) -> usize {
        self.n_params
    }

    fn eval(&self, x: f64, params: &[f64]) -> f64 {
        self.slots
            .iter()
            .map(|s| s.shape.eval(x, &params[s.offset..s.offset + s.shape.param_count()]))
            .sum()
    }
}

/// A bounded fit parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Parameter {
    pub id: ParamId,
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

impl Parameter {
    pub fn free(id: ParamId, value: f64) -> Self {
        Self {
            id,
            value,
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
        }
    }

    pub fn bounded(id: ParamId, value: f64, min: f64, max: f64) -> Self {
        Self { id, value, min, max }
    }

    pub fn clamp(&self, v: f64) -> f64 {
        v.max(self.min).min(self.max)
    }
}

/// Ordered parameter set aligned with a `CompositeModel`'s flat vector.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Parameters {
    entries: Vec<Parameter>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, param: Parameter) {
        self.entries.push(param);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.entries.iter()
    }

    pub fn get(&self, id: ParamId) -> Option<&Parameter> {
        self.entries.iter().find(|p| p.id == id)
    }

    /// Replace the starting value of `id`; returns `false` if it is not in the set.
    pub fn set_value(&mut self, id: ParamId, value: f64) -> bool {
        match self.entries.iter_mut().find(|p| p.id == id) {
            Some(p) => {
                p.value = value;
                true
            }
            None => false,
        }
    }

    /// Starting values, projected into bounds.
    pub fn initial_values(&self) -> Vec<f64> {
        self.entries.iter().map(|p| p.clamp(p.value)).collect()
    }

    /// Project `values` onto the box constraints in place.
    pub fn project(&self, values: &mut [f64]) {
        for (v, p) in values.iter_mut().zip(&self.entries) {
            *v = p.clamp(*v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ParamKind, PeakKind};

    #[test]
    fn composite_sums_components_with_offsets() {
        let mut model = CompositeModel::new();
        assert_eq!(model.push(Component::Background, Shape::Linear), 0);
        assert_eq!(model.push(Component::Peak(0), Shape::Peak(PeakKind::Gaussian)), 2);
        assert_eq!(model.n_params(), 5);

        let params = [0.0, 10.0, 650.0, 0.0, 20.0];
        // Zero-amplitude peak leaves only the intercept.
        assert!((model.eval(650.0, &params) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn projection_respects_bounds() {
        let mut params = Parameters::new();
        params.push(Parameter::bounded(ParamId::peak(0, ParamKind::Sigma), 20.0, 1.0, 100.0));
        params.push(Parameter::free(ParamId::background(ParamKind::Slope), 0.0));

        let mut v = vec![500.0, -1e9];
        params.project(&mut v);
        assert_eq!(v, vec![100.0, -1e9]);
    }
}
