//! Response-surface expressions.
//!
//! Technology packages carry pre-fitted regression formulae as free-form algebraic text, e.g.
//! `20 + 0.04*ETW + 8000*RLHP20 + 2500*RLHP60 + 1200*HP_ETW`. The text is parsed once, when the
//! package is loaded, into an [`Expression`] tree. Evaluating the tree can only read the
//! [`SurfaceInputs`] passed to it and cannot fail.
//!
//! Supported syntax:
//!
//! * numeric literals, including exponents (`1.5e-3`)
//! * the variables `ETW`, `RLHP20`, `RLHP60` and `HP_ETW`
//! * binary operators `+`, `-`, `*`, `/`, `^` and `**` (the last two are equivalent and right
//!   associative)
//! * unary minus and plus
//! * parentheses
//! * the functions `exp`, `ln`, `log10`, `sqrt`, `abs`, `min` and `max`
use anyhow::{Context, Result, bail, ensure};
use std::fmt;
use std::str::FromStr;
use strum::{EnumIter, EnumString, IntoStaticStr};

/// A variable which may appear in a response-surface expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumString, IntoStaticStr)]
pub enum Variable {
    /// Equivalent test weight (lbs)
    #[strum(serialize = "ETW")]
    EquivalentTestWeight,
    /// Road-load horsepower at 20 mph per unit of equivalent test weight
    #[strum(serialize = "RLHP20")]
    RoadLoad20,
    /// Road-load horsepower at 60 mph per unit of equivalent test weight
    #[strum(serialize = "RLHP60")]
    RoadLoad60,
    /// Rated horsepower per unit of equivalent test weight
    #[strum(serialize = "HP_ETW")]
    PowerPerWeight,
}

/// The normalised inputs to a response surface for one sizing trial
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceInputs {
    /// Equivalent test weight (lbs)
    pub etw: f64,
    /// Road-load horsepower at 20 mph divided by ETW
    pub rlhp20: f64,
    /// Road-load horsepower at 60 mph divided by ETW
    pub rlhp60: f64,
    /// Rated horsepower divided by ETW
    pub hp_etw: f64,
}

impl SurfaceInputs {
    /// Normalise road-load and power terms by equivalent test weight
    pub fn new(etw: f64, rlhp20: f64, rlhp60: f64, rated_power: f64) -> Self {
        Self {
            etw,
            rlhp20: rlhp20 / etw,
            rlhp60: rlhp60 / etw,
            hp_etw: rated_power / etw,
        }
    }

    fn get(&self, variable: Variable) -> f64 {
        match variable {
            Variable::EquivalentTestWeight => self.etw,
            Variable::RoadLoad20 => self.rlhp20,
            Variable::RoadLoad60 => self.rlhp60,
            Variable::PowerPerWeight => self.hp_etw,
        }
    }
}

/// A function which may be called in an expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "lowercase")]
enum Function {
    Exp,
    Ln,
    Log10,
    Sqrt,
    Abs,
    Min,
    Max,
}

impl Function {
    /// The number of arguments the function takes
    fn arity(self) -> usize {
        match self {
            Self::Min | Self::Max => 2,
            _ => 1,
        }
    }

    fn apply(self, args: &[f64]) -> f64 {
        match self {
            Self::Exp => args[0].exp(),
            Self::Ln => args[0].ln(),
            Self::Log10 => args[0].log10(),
            Self::Sqrt => args[0].sqrt(),
            Self::Abs => args[0].abs(),
            Self::Min => args[0].min(args[1]),
            Self::Max => args[0].max(args[1]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Constant(f64),
    Variable(Variable),
    Negate(Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    Call(Function, Vec<Node>),
}

impl Node {
    fn evaluate(&self, inputs: &SurfaceInputs) -> f64 {
        match self {
            Self::Constant(value) => *value,
            Self::Variable(variable) => inputs.get(*variable),
            Self::Negate(node) => -node.evaluate(inputs),
            Self::Binary(op, lhs, rhs) => {
                let lhs = lhs.evaluate(inputs);
                let rhs = rhs.evaluate(inputs);
                match op {
                    BinaryOp::Add => lhs + rhs,
                    BinaryOp::Subtract => lhs - rhs,
                    BinaryOp::Multiply => lhs * rhs,
                    BinaryOp::Divide => lhs / rhs,
                    BinaryOp::Power => lhs.powf(rhs),
                }
            }
            Self::Call(function, args) => {
                let args: Vec<f64> = args.iter().map(|arg| arg.evaluate(inputs)).collect();
                function.apply(&args)
            }
        }
    }
}

/// A compiled response-surface expression
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    text: String,
    root: Node,
}

impl Expression {
    /// Parse an expression from text
    pub fn parse(text: &str) -> Result<Self> {
        let tokens = tokenise(text)?;
        ensure!(!tokens.is_empty(), "Expression is empty");

        let mut parser = Parser { tokens, pos: 0 };
        let root = parser.expression()?;
        if let Some(token) = parser.peek() {
            bail!("Unexpected {token} after end of expression");
        }

        Ok(Self {
            text: text.trim().to_string(),
            root,
        })
    }

    /// Evaluate the expression for the given inputs
    pub fn evaluate(&self, inputs: &SurfaceInputs) -> f64 {
        self.root.evaluate(inputs)
    }

    /// The original text of the expression
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl FromStr for Expression {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LeftParen,
    RightParen,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "number {value}"),
            Self::Identifier(name) => write!(f, "identifier {name}"),
            Self::Plus => write!(f, "'+'"),
            Self::Minus => write!(f, "'-'"),
            Self::Star => write!(f, "'*'"),
            Self::Slash => write!(f, "'/'"),
            Self::Caret => write!(f, "'^'"),
            Self::LeftParen => write!(f, "'('"),
            Self::RightParen => write!(f, "')'"),
            Self::Comma => write!(f, "','"),
        }
    }
}

/// Split expression text into tokens
fn tokenise(text: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }

                // Optional exponent, e.g. 1e-3
                if i < chars.len() && matches!(chars[i], 'e' | 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && matches!(chars[j], '+' | '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }

                let literal: String = chars[start..i].iter().collect();
                let value = literal
                    .parse()
                    .with_context(|| format!("Invalid number: {literal}"))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Identifier(chars[start..i].iter().collect()));
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Caret);
                i += 2;
            }
            _ => {
                let token = match c {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '^' => Token::Caret,
                    '(' => Token::LeftParen,
                    ')' => Token::RightParen,
                    ',' => Token::Comma,
                    _ => bail!("Unexpected character '{c}' at position {i}"),
                };
                tokens.push(token);
                i += 1;
            }
        }
    }

    Ok(tokens)
}

/// A recursive-descent parser over a token stream
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        match self.next() {
            Some(token) if &token == expected => Ok(()),
            Some(token) => bail!("Expected {expected} but found {token}"),
            None => bail!("Expected {expected} but reached end of expression"),
        }
    }

    /// expression := term (('+' | '-') term)*
    fn expression(&mut self) -> Result<Node> {
        let mut node = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Subtract,
                _ => return Ok(node),
            };
            self.pos += 1;
            node = Node::Binary(op, Box::new(node), Box::new(self.term()?));
        }
    }

    /// term := unary (('*' | '/') unary)*
    fn term(&mut self) -> Result<Node> {
        let mut node = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Multiply,
                Some(Token::Slash) => BinaryOp::Divide,
                _ => return Ok(node),
            };
            self.pos += 1;
            node = Node::Binary(op, Box::new(node), Box::new(self.unary()?));
        }
    }

    /// unary := ('-' | '+') unary | power
    fn unary(&mut self) -> Result<Node> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(Node::Negate(Box::new(self.unary()?)))
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    /// power := primary ('^' unary)?
    fn power(&mut self) -> Result<Node> {
        let base = self.primary()?;
        if self.peek() == Some(&Token::Caret) {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(Node::Binary(
                BinaryOp::Power,
                Box::new(base),
                Box::new(exponent),
            ));
        }

        Ok(base)
    }

    /// primary := number | variable | function '(' args ')' | '(' expression ')'
    fn primary(&mut self) -> Result<Node> {
        match self.next() {
            Some(Token::Number(value)) => Ok(Node::Constant(value)),
            Some(Token::Identifier(name)) => {
                if self.peek() == Some(&Token::LeftParen) {
                    self.pos += 1;
                    self.call(&name)
                } else {
                    let variable = Variable::from_str(&name)
                        .with_context(|| format!("Unknown variable: {name}"))?;
                    Ok(Node::Variable(variable))
                }
            }
            Some(Token::LeftParen) => {
                let node = self.expression()?;
                self.expect(&Token::RightParen)?;
                Ok(node)
            }
            Some(token) => bail!("Unexpected {token}"),
            None => bail!("Unexpected end of expression"),
        }
    }

    /// Parse the arguments of a function call (the opening bracket has been consumed)
    fn call(&mut self, name: &str) -> Result<Node> {
        let function =
            Function::from_str(name).with_context(|| format!("Unknown function: {name}"))?;

        let mut args = vec![self.expression()?];
        while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            args.push(self.expression()?);
        }
        self.expect(&Token::RightParen)?;

        ensure!(
            args.len() == function.arity(),
            "Function {name} takes {} argument(s) but {} were given",
            function.arity(),
            args.len()
        );

        Ok(Node::Call(function, args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use float_cmp::assert_approx_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn inputs() -> SurfaceInputs {
        SurfaceInputs::new(4000.0, 12.0, 20.0, 200.0)
    }

    #[test]
    fn test_surface_inputs_normalised() {
        let inputs = SurfaceInputs::new(4000.0, 12.0, 20.0, 200.0);
        assert_eq!(inputs.etw, 4000.0);
        assert_approx_eq!(f64, inputs.rlhp20, 0.003);
        assert_approx_eq!(f64, inputs.rlhp60, 0.005);
        assert_approx_eq!(f64, inputs.hp_etw, 0.05);
    }

    #[rstest]
    #[case("1 + 2 * 3", 7.0)]
    #[case("(1 + 2) * 3", 9.0)]
    #[case("2 ^ 3 ^ 2", 512.0)] // right associative
    #[case("2 ** 3", 8.0)]
    #[case("-2 ^ 2", -4.0)]
    #[case("2 ^ -1", 0.5)]
    #[case("10 / 4 - 1", 1.5)]
    #[case("1.5e-3 * 2E3", 3.0)]
    #[case("+3 - -2", 5.0)]
    #[case("max(1, 2) + min(3, 4) + abs(-1)", 6.0)]
    #[case("sqrt(16) + ln(exp(2)) + log10(100)", 8.0)]
    #[case("ETW / 1000", 4.0)]
    #[case("1000 * RLHP20 + 1000 * RLHP60", 8.0)]
    #[case("100 * HP_ETW", 5.0)]
    #[case("20 + 0.04*ETW + 8000*RLHP20 + 2500*RLHP60 + 1200*HP_ETW", 276.5)]
    fn test_evaluate(inputs: SurfaceInputs, #[case] text: &str, #[case] expected: f64) {
        let expression = Expression::parse(text).unwrap();
        assert_approx_eq!(f64, expression.evaluate(&inputs), expected, epsilon = 1e-9);
    }

    #[rstest]
    #[case("", "Expression is empty")]
    #[case("1 +", "Unexpected end of expression")]
    #[case("(1 + 2", "Expected ')' but reached end of expression")]
    #[case("1 2", "Unexpected number 2 after end of expression")]
    #[case("CURB_WEIGHT * 2", "Unknown variable: CURB_WEIGHT")]
    #[case("cbrt(8)", "Unknown function: cbrt")]
    #[case("max(1)", "Function max takes 2 argument(s) but 1 were given")]
    #[case("1 $ 2", "Unexpected character '$' at position 2")]
    #[case("1..2", "Invalid number: 1..2")]
    fn test_parse_invalid(#[case] text: &str, #[case] msg: &str) {
        assert_error!(Expression::parse(text), msg);
    }

    #[test]
    fn test_text_is_trimmed() {
        let expression: Expression = "  ETW * 2 ".parse().unwrap();
        assert_eq!(expression.text(), "ETW * 2");
        assert_eq!(expression.to_string(), "ETW * 2");
    }
}
