use super::{Relu, Sigmoid, Tanh};

#[derive(Clone, Debug)]
pub enum ActFn {
    Sigmoid(Sigmoid),
    Relu(Relu),
    Tanh(Tanh),
}

impl ActFn {
    pub fn sigmoid(amp: f32) -> Self {
        ActFn::Sigmoid(Sigmoid::new(amp))
    }

    pub fn relu() -> Self {
        ActFn::Relu(Relu::new())
    }

    pub fn tanh() -> Self {
        ActFn::Tanh(Tanh::new())
    }

    pub fn f(&self, x: f32) -> f32 {
        match self {
            ActFn::Sigmoid(a) => a.f(x),
            ActFn::Relu(a) => a.f(x),
            ActFn::Tanh(a) => a.f(x),
        }
    }

    pub fn df(&self, x: f32) -> f32 {
        match self {
            ActFn::Sigmoid(a) => a.df(x),
            ActFn::Relu(a) => a.df(x),
            ActFn::Tanh(a) => a.df(x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_derivative(act_fn: ActFn) {
        const H: f32 = 1e-3;

        for &z in &[-2.0, -0.3, 0.4, 1.7] {
            let numeric = (act_fn.f(z + H) - act_fn.f(z - H)) / (2. * H);
            assert!(
                (numeric - act_fn.df(z)).abs() < 1e-2,
                "{act_fn:?} at {z}: {numeric} vs {}",
                act_fn.df(z)
            );
        }
    }

    #[test]
    fn derivatives_match_finite_differences() {
        check_derivative(ActFn::sigmoid(1.0));
        check_derivative(ActFn::sigmoid(2.5));
        check_derivative(ActFn::relu());
        check_derivative(ActFn::tanh());
    }
}
