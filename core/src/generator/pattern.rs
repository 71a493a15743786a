/// How one sequence of a pattern derives from the base generator parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternSequence {
  pub length_factor: f64,
  pub quantize_factor: f64,
  pub probability_factor: f64,
}

impl PatternSequence {
  pub fn new(length_factor: f64, quantize_factor: f64, probability_factor: f64) -> PatternSequence {
    PatternSequence {
      length_factor,
      quantize_factor,
      probability_factor,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
  pub id: String,
  pub sequences: Vec<PatternSequence>,
}

impl Pattern {
  pub fn new<T: Into<String>>(id: T, sequences: Vec<PatternSequence>) -> Pattern {
    Pattern {
      id: id.into(),
      sequences,
    }
  }
}

pub struct PatternBank {
  patterns: Vec<Pattern>,
}

impl PatternBank {
  pub fn get(&self, id: &str) -> Option<&Pattern> {
    self.patterns.iter().find(|pattern| pattern.id == id)
  }

  pub fn ids(&self) -> Vec<&str> {
    self
      .patterns
      .iter()
      .map(|pattern| pattern.id.as_str())
      .collect()
  }

  pub fn add(&mut self, pattern: Pattern) {
    self.patterns.retain(|existing| existing.id != pattern.id);
    self.patterns.push(pattern);
  }
}

impl Default for PatternBank {
  fn default() -> PatternBank {
    let one_bar_and_subdivisions = Pattern::new(
      "1",
      vec![
        PatternSequence::new(1.0, 0.5, 0.4),
        PatternSequence::new(0.5, 1.0, 0.4),
        PatternSequence::new(0.5, 1.0, 0.4),
        PatternSequence::new(0.25, 1.0, 0.4),
        PatternSequence::new(0.25, 1.0, 0.4),
        PatternSequence::new(0.125, 1.0, 0.4),
      ],
    );

    let sparse_fine_grained = Pattern::new(
      "2",
      vec![
        PatternSequence::new(1.0, 0.5, 0.2),
        PatternSequence::new(0.5, 1.0, 0.2),
        PatternSequence::new(0.5, 0.5, 0.2),
        PatternSequence::new(0.25, 0.5, 0.2),
        PatternSequence::new(0.25, 0.5, 0.2),
        PatternSequence::new(0.125, 0.5, 0.2),
        PatternSequence::new(0.125, 0.5, 0.2),
      ],
    );

    PatternBank {
      patterns: vec![one_bar_and_subdivisions, sparse_fine_grained],
    }
  }
}
