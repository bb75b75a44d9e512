use bincode::{
    de::Decoder,
    enc::Encoder,
    error::{DecodeError, EncodeError},
    Decode, Encode,
};
use hashbrown::HashSet;

/// Pattern of a feature column.
#[derive(Debug, Eq, PartialEq)]
enum Pattern {
    Any,
    Exact(String),
    Alternatives(HashSet<String>),
}

impl Pattern {
    fn parse(p: &str) -> Self {
        if p == "*" {
            return Self::Any;
        }
        match p.strip_prefix('(').and_then(|p| p.strip_suffix(')')) {
            Some(inner) => Self::Alternatives(inner.split('|').map(String::from).collect()),
            None => Self::Exact(p.to_string()),
        }
    }

    fn is_match(&self, f: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(s) => s == f,
            Self::Alternatives(s) => s.contains(f),
        }
    }
}

/// Output column of a rewrite rule.
#[derive(Debug)]
enum Output {
    // Zero-origin column of the input.
    Column(usize),
    Literal(String),
}

impl Output {
    fn parse(r: &str) -> Self {
        match r.strip_prefix('$').and_then(|n| n.parse::<usize>().ok()) {
            Some(n) if n >= 1 => Self::Column(n - 1),
            _ => Self::Literal(r.to_string()),
        }
    }

    fn apply<S>(&self, features: &[S]) -> String
    where
        S: AsRef<str>,
    {
        match self {
            Self::Column(i) => features.get(*i).map_or("*", |f| f.as_ref()).to_string(),
            Self::Literal(s) => s.clone(),
        }
    }
}

#[derive(Debug)]
enum Step {
    // Descends to the node when the next column matches.
    Child(Pattern, usize),
    // Completes a rule.
    Emit(Vec<Output>),
}

/// Builder of [`FeatureRewriter`].
///
/// Rules sharing leading patterns share trie nodes.
pub struct FeatureRewriterBuilder {
    // Steps of each node in order of registration.
    nodes: Vec<Vec<Step>>,
    rules: Vec<(Vec<String>, Vec<String>)>,
}

impl FeatureRewriterBuilder {
    pub fn new() -> Self {
        Self {
            nodes: vec![vec![]],
            rules: vec![],
        }
    }

    /// Adds a rule.
    ///
    /// Each cell of `pattern` is `*`, an exact string, or alternatives `(a|b)`.
    /// Each cell of `rewrite` is a literal or a one-origin column reference `$n`;
    /// references beyond the input yield `*`.
    pub fn add_rule<S>(&mut self, pattern: &[S], rewrite: &[S])
    where
        S: AsRef<str>,
    {
        self.rules.push((
            pattern.iter().map(|p| p.as_ref().to_string()).collect(),
            rewrite.iter().map(|r| r.as_ref().to_string()).collect(),
        ));

        let mut node = 0;
        for p in pattern {
            let p = Pattern::parse(p.as_ref());
            let existing = self.nodes[node].iter().find_map(|step| match step {
                Step::Child(q, child) if *q == p => Some(*child),
                _ => None,
            });
            node = match existing {
                Some(child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(vec![]);
                    self.nodes[node].push(Step::Child(p, child));
                    child
                }
            };
        }
        let outputs = rewrite.iter().map(|r| Output::parse(r.as_ref())).collect();
        self.nodes[node].push(Step::Emit(outputs));
    }
}

/// Rewriter of feature columns by pattern rules.
///
/// A rule whose pattern is shorter than the input matches its prefix.
pub struct FeatureRewriter {
    nodes: Vec<Vec<Step>>,
    // Source rules in order of registration, kept for serialization.
    rules: Vec<(Vec<String>, Vec<String>)>,
}

impl From<FeatureRewriterBuilder> for FeatureRewriter {
    fn from(builder: FeatureRewriterBuilder) -> Self {
        Self {
            nodes: builder.nodes,
            rules: builder.rules,
        }
    }
}

impl FeatureRewriter {
    fn find<S>(&self, node: usize, features: &[S], depth: usize) -> Option<&[Output]>
    where
        S: AsRef<str>,
    {
        for step in &self.nodes[node] {
            match step {
                Step::Emit(outputs) => return Some(outputs.as_slice()),
                Step::Child(p, child) => {
                    let matched = features.get(depth).is_some_and(|f| p.is_match(f.as_ref()));
                    if matched {
                        if let Some(outputs) = self.find(*child, features, depth + 1) {
                            return Some(outputs);
                        }
                    }
                }
            }
        }
        None
    }

    /// Returns the rewritten features if a rule matches.
    /// If multiple rules match, the earliest registered one is applied.
    pub fn rewrite<S>(&self, features: &[S]) -> Option<Vec<String>>
    where
        S: AsRef<str>,
    {
        self.find(0, features, 0)
            .map(|outputs| outputs.iter().map(|o| o.apply(features)).collect())
    }

    /// Returns the rewritten features, or a copy of the input if no rule matches.
    pub fn rewrite_or_clone<S>(&self, features: &[S]) -> Vec<String>
    where
        S: AsRef<str>,
    {
        self.rewrite(features)
            .unwrap_or_else(|| features.iter().map(|f| f.as_ref().to_string()).collect())
    }
}

impl Decode for FeatureRewriter {
    fn decode<D: Decoder>(decoder: &mut D) -> Result<Self, DecodeError> {
        let rules: Vec<(Vec<String>, Vec<String>)> = Decode::decode(decoder)?;
        let mut builder = FeatureRewriterBuilder::new();
        for (pattern, rewrite) in &rules {
            builder.add_rule(pattern, rewrite);
        }
        Ok(Self::from(builder))
    }
}
bincode::impl_borrow_decode!(FeatureRewriter);

impl Encode for FeatureRewriter {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        Encode::encode(&self.rules, encoder)
    }
}
