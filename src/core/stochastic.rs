/// Stochastic evaluator: runs macro expressions against a whitelist of
/// random-distribution functions and renders templates to text.

use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use rand_distr::{Beta, Distribution, Exp, Gamma, LogNormal, Normal, Pareto, Weibull};
use rustc_hash::FxHashMap;
use std::f64::consts::{PI, TAU};

use crate::core::distribution::WeightedDistribution;
use crate::core::expr::{Expr, ExprError, ExprValue};
use crate::core::template::{Template, TemplateError, TemplateToken};

/// Signature of a function callable from a macro.
pub type MacroFn = fn(&[ExprValue], &mut dyn RngCore) -> Result<ExprValue, ExprError>;

/// The set of functions a macro may call, keyed by name.
#[derive(Clone)]
pub struct FunctionRegistry {
    functions: FxHashMap<&'static str, MacroFn>,
}

impl FunctionRegistry {
    pub fn empty() -> Self {
        Self {
            functions: FxHashMap::default(),
        }
    }

    /// The standard distribution library.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register("uniform", uniform);
        registry.register("triangular", triangular);
        registry.register("betavariate", betavariate);
        registry.register("expovariate", expovariate);
        registry.register("gammavariate", gammavariate);
        registry.register("gauss", gauss);
        registry.register("lognormvariate", lognormvariate);
        registry.register("normalvariate", normalvariate);
        registry.register("vonmisesvariate", vonmisesvariate);
        registry.register("paretovariate", paretovariate);
        registry.register("weibullvariate", weibullvariate);
        registry.register("randrange", randrange);
        registry.register("choice", choice);
        registry.register("weightedchoice", weightedchoice);
        registry
    }

    pub fn register(&mut self, name: &'static str, function: MacroFn) {
        self.functions.insert(name, function);
    }

    pub fn get(&self, name: &str) -> Option<MacroFn> {
        self.functions.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

/// Evaluates macro expressions and renders tokenized templates.
///
/// Nothing is cached: every call re-parses and re-samples, so the same
/// template renders differently on each call when it contains random
/// functions.
#[derive(Debug, Clone, Default)]
pub struct StochasticEvaluator {
    functions: FunctionRegistry,
}

impl StochasticEvaluator {
    pub fn new(functions: FunctionRegistry) -> Self {
        Self { functions }
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Evaluate one macro expression and render the result as text.
    pub fn evaluate(&self, expression: &str, rng: &mut dyn RngCore) -> Result<String, TemplateError> {
        self.evaluate_value(expression, rng).map(|v| v.to_string())
    }

    /// Evaluate one macro expression to a value.
    pub fn evaluate_value(
        &self,
        expression: &str,
        rng: &mut dyn RngCore,
    ) -> Result<ExprValue, TemplateError> {
        Expr::parse(expression)
            .and_then(|expr| self.eval(&expr, rng))
            .map_err(|cause| TemplateError::Evaluation {
                expression: expression.trim().to_string(),
                cause,
            })
    }

    /// Concatenate literal tokens verbatim and macro tokens via `evaluate`.
    /// Fails as a whole if any macro fails.
    pub fn render(&self, tokens: &[TemplateToken], rng: &mut dyn RngCore) -> Result<String, TemplateError> {
        let mut output = String::new();
        for token in tokens {
            match token {
                TemplateToken::Literal(text) => output.push_str(text),
                TemplateToken::Macro(expression) => {
                    output.push_str(&self.evaluate(expression, rng)?);
                }
            }
        }
        Ok(output)
    }

    /// Tokenize and render `text` in one step.
    pub fn process(&self, text: &str, rng: &mut dyn RngCore) -> Result<String, TemplateError> {
        let template = Template::parse(text)?;
        self.render(&template.tokens, rng)
    }

    fn eval(&self, expr: &Expr, rng: &mut dyn RngCore) -> Result<ExprValue, ExprError> {
        match expr {
            Expr::Int(n) => Ok(ExprValue::Int(*n)),
            Expr::Float(n) => Ok(ExprValue::Float(*n)),
            Expr::Str(s) => Ok(ExprValue::Str(s.clone())),
            Expr::Bool(b) => Ok(ExprValue::Bool(*b)),
            Expr::List(items) => items
                .iter()
                .map(|item| self.eval(item, rng))
                .collect::<Result<Vec<_>, _>>()
                .map(ExprValue::List),
            Expr::Map(entries) => {
                let mut evaluated = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    let key = self.eval(key, rng)?;
                    let value = self.eval(value, rng)?;
                    // Later duplicates replace earlier ones, keeping position.
                    match evaluated.iter_mut().find(|(k, _)| *k == key) {
                        Some((_, existing)) => *existing = value,
                        None => evaluated.push((key, value)),
                    }
                }
                Ok(ExprValue::Map(evaluated))
            }
            Expr::Unary { op, operand } => ExprValue::unary(*op, self.eval(operand, rng)?),
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs, rng)?;
                let rhs = self.eval(rhs, rng)?;
                ExprValue::binary(*op, lhs, rhs)
            }
            Expr::Call { name, args } => {
                let function = self
                    .functions
                    .get(name)
                    .ok_or_else(|| ExprError::UnknownFunction(name.clone()))?;
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, rng))
                    .collect::<Result<Vec<_>, _>>()?;
                function(&args, rng)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

fn check_arity(
    function: &str,
    args: &[ExprValue],
    min: usize,
    max: usize,
    expected: &'static str,
) -> Result<(), ExprError> {
    if args.len() < min || args.len() > max {
        return Err(ExprError::Arity {
            function: function.to_string(),
            expected,
            found: args.len(),
        });
    }
    Ok(())
}

fn invalid(function: &str, message: impl ToString) -> ExprError {
    ExprError::InvalidArgument {
        function: function.to_string(),
        message: message.to_string(),
    }
}

/// A finite numeric argument.
fn number(function: &str, value: &ExprValue) -> Result<f64, ExprError> {
    let n = value
        .as_f64()
        .ok_or_else(|| invalid(function, format!("expected a number, got {}", value.type_name())))?;
    if !n.is_finite() {
        return Err(invalid(function, format!("expected a finite number, got {}", n)));
    }
    Ok(n)
}

fn integer(function: &str, value: &ExprValue) -> Result<i64, ExprError> {
    match value {
        ExprValue::Int(n) => Ok(*n),
        other => Err(invalid(
            function,
            format!("expected an integer, got {}", other.type_name()),
        )),
    }
}

/// Two numeric parameters, as taken by most distributions.
fn two_numbers(function: &str, args: &[ExprValue]) -> Result<(f64, f64), ExprError> {
    check_arity(function, args, 2, 2, "2")?;
    Ok((number(function, &args[0])?, number(function, &args[1])?))
}

fn sample<D: Distribution<f64>>(dist: D, rng: &mut dyn RngCore) -> ExprValue {
    ExprValue::Float(dist.sample(rng))
}

// ---------------------------------------------------------------------------
// Standard library
// ---------------------------------------------------------------------------

fn uniform(args: &[ExprValue], rng: &mut dyn RngCore) -> Result<ExprValue, ExprError> {
    let (a, b) = two_numbers("uniform", args)?;
    Ok(ExprValue::Float(a + (b - a) * rng.gen::<f64>()))
}

fn triangular(args: &[ExprValue], rng: &mut dyn RngCore) -> Result<ExprValue, ExprError> {
    check_arity("triangular", args, 0, 3, "0 to 3")?;
    let mut low = args.first().map(|v| number("triangular", v)).transpose()?.unwrap_or(0.0);
    let mut high = args.get(1).map(|v| number("triangular", v)).transpose()?.unwrap_or(1.0);
    if high == low {
        return Ok(ExprValue::Float(low));
    }
    let mut c = match args.get(2) {
        Some(mode) => (number("triangular", mode)? - low) / (high - low),
        None => 0.5,
    };
    let mut u = rng.gen::<f64>();
    if u > c {
        u = 1.0 - u;
        c = 1.0 - c;
        std::mem::swap(&mut low, &mut high);
    }
    Ok(ExprValue::Float(low + (high - low) * (u * c).sqrt()))
}

fn betavariate(args: &[ExprValue], rng: &mut dyn RngCore) -> Result<ExprValue, ExprError> {
    let (alpha, beta) = two_numbers("betavariate", args)?;
    if !(2.0 * alpha * beta).is_finite() {
        return Err(invalid("betavariate", "parameters are too large"));
    }
    let dist = Beta::new(alpha, beta).map_err(|e| invalid("betavariate", e))?;
    Ok(sample(dist, rng))
}

fn expovariate(args: &[ExprValue], rng: &mut dyn RngCore) -> Result<ExprValue, ExprError> {
    check_arity("expovariate", args, 1, 1, "1")?;
    let lambda = number("expovariate", &args[0])?;
    if lambda == 0.0 {
        return Err(invalid("expovariate", "lambda must be non-zero"));
    }
    let dist = Exp::new(lambda.abs()).map_err(|e| invalid("expovariate", e))?;
    let value = dist.sample(rng);
    // A negative rate mirrors the distribution onto the negative axis.
    Ok(ExprValue::Float(if lambda < 0.0 { -value } else { value }))
}

fn gammavariate(args: &[ExprValue], rng: &mut dyn RngCore) -> Result<ExprValue, ExprError> {
    let (shape, scale) = two_numbers("gammavariate", args)?;
    let dist = Gamma::new(shape, scale).map_err(|e| invalid("gammavariate", e))?;
    Ok(sample(dist, rng))
}

fn gauss(args: &[ExprValue], rng: &mut dyn RngCore) -> Result<ExprValue, ExprError> {
    let (mu, sigma) = two_numbers("gauss", args)?;
    let dist = Normal::new(mu, sigma).map_err(|e| invalid("gauss", e))?;
    Ok(sample(dist, rng))
}

fn normalvariate(args: &[ExprValue], rng: &mut dyn RngCore) -> Result<ExprValue, ExprError> {
    let (mu, sigma) = two_numbers("normalvariate", args)?;
    let dist = Normal::new(mu, sigma).map_err(|e| invalid("normalvariate", e))?;
    Ok(sample(dist, rng))
}

fn lognormvariate(args: &[ExprValue], rng: &mut dyn RngCore) -> Result<ExprValue, ExprError> {
    let (mu, sigma) = two_numbers("lognormvariate", args)?;
    let dist = LogNormal::new(mu, sigma).map_err(|e| invalid("lognormvariate", e))?;
    Ok(sample(dist, rng))
}

/// Best–Fisher rejection sampler for the circular normal distribution.
fn vonmisesvariate(args: &[ExprValue], rng: &mut dyn RngCore) -> Result<ExprValue, ExprError> {
    let (mu, kappa) = two_numbers("vonmisesvariate", args)?;
    if kappa.is_nan() || kappa < 0.0 {
        return Err(invalid("vonmisesvariate", "kappa must be non-negative"));
    }
    if kappa <= 1e-6 {
        return Ok(ExprValue::Float(TAU * rng.gen::<f64>()));
    }

    let s = 0.5 / kappa;
    let r = s + (1.0 + s * s).sqrt();
    let z = loop {
        let z = (PI * rng.gen::<f64>()).cos();
        let d = z / (r + z);
        let u = rng.gen::<f64>();
        if u < 1.0 - d * d || u <= (1.0 - d) * d.exp() {
            break z;
        }
    };

    let q = 1.0 / r;
    let f = (q + z) / (1.0 + q * z);
    let theta = if rng.gen::<f64>() > 0.5 {
        mu + f.acos()
    } else {
        mu - f.acos()
    };
    Ok(ExprValue::Float(theta.rem_euclid(TAU)))
}

fn paretovariate(args: &[ExprValue], rng: &mut dyn RngCore) -> Result<ExprValue, ExprError> {
    check_arity("paretovariate", args, 1, 1, "1")?;
    let alpha = number("paretovariate", &args[0])?;
    let dist = Pareto::new(1.0, alpha).map_err(|e| invalid("paretovariate", e))?;
    Ok(sample(dist, rng))
}

fn weibullvariate(args: &[ExprValue], rng: &mut dyn RngCore) -> Result<ExprValue, ExprError> {
    let (scale, shape) = two_numbers("weibullvariate", args)?;
    let dist = Weibull::new(scale, shape).map_err(|e| invalid("weibullvariate", e))?;
    Ok(sample(dist, rng))
}

/// `randrange(stop)`, `randrange(start, stop)`, `randrange(start, stop, step)`.
///
/// Half-open like a standard range, except that `start == stop` yields
/// `start` instead of failing.
fn randrange(args: &[ExprValue], rng: &mut dyn RngCore) -> Result<ExprValue, ExprError> {
    check_arity("randrange", args, 1, 3, "1 to 3")?;
    let ints = args
        .iter()
        .map(|v| integer("randrange", v))
        .collect::<Result<Vec<_>, _>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => unreachable!("arity checked"),
    };
    if step == 0 {
        return Err(invalid("randrange", "step must not be zero"));
    }
    if start == stop {
        return Ok(ExprValue::Int(start));
    }

    let span = i128::from(stop) - i128::from(start);
    let step = i128::from(step);
    let count = if step > 0 {
        (span + step - 1) / step
    } else {
        (span + step + 1) / step
    };
    if count <= 0 {
        return Err(invalid(
            "randrange",
            format!("empty range ({}, {}, {})", start, stop, step),
        ));
    }
    let index = rng.gen_range(0..count);
    let value = i128::from(start) + index * step;
    i64::try_from(value)
        .map(ExprValue::Int)
        .map_err(|_| ExprError::Overflow)
}

fn choice(args: &[ExprValue], rng: &mut dyn RngCore) -> Result<ExprValue, ExprError> {
    check_arity("choice", args, 1, 1, "1")?;
    let picked = match &args[0] {
        ExprValue::List(items) => items.choose(rng).cloned(),
        ExprValue::Map(entries) => entries.choose(rng).map(|(key, _)| key.clone()),
        ExprValue::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            chars.choose(rng).map(|c| ExprValue::Str(c.to_string()))
        }
        other => {
            return Err(invalid(
                "choice",
                format!("expected a sequence, got {}", other.type_name()),
            ))
        }
    };
    picked.ok_or_else(|| invalid("choice", "cannot choose from an empty sequence"))
}

/// Picks a key of `{item: weight, ...}` with probability proportional to
/// its weight.
fn weightedchoice(args: &[ExprValue], rng: &mut dyn RngCore) -> Result<ExprValue, ExprError> {
    check_arity("weightedchoice", args, 1, 1, "1")?;
    let ExprValue::Map(entries) = &args[0] else {
        return Err(invalid(
            "weightedchoice",
            format!("expected a mapping, got {}", args[0].type_name()),
        ));
    };
    let mut items = Vec::with_capacity(entries.len());
    let mut weights = Vec::with_capacity(entries.len());
    for (item, weight) in entries {
        items.push(item.clone());
        weights.push(number("weightedchoice", weight)?);
    }
    let dist = WeightedDistribution::build(items, weights).map_err(|e| invalid("weightedchoice", e))?;
    Ok(dist.sample(rng).clone())
}
