/// Available commands and autocomplete logic

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "dashboard",
    aliases: &["d", "home", "stats"],
    description: "Ward overview",
  },
  Command {
    name: "patients",
    aliases: &["p", "patient"],
    description: "Patient list",
  },
  Command {
    name: "add",
    aliases: &["a", "admit"],
    description: "Admit a new patient",
  },
  Command {
    name: "vitals",
    aliases: &["v", "vital"],
    description: "Latest vital signs, all wards",
  },
  Command {
    name: "record",
    aliases: &["r", "monitor"],
    description: "Record vital signs",
  },
  Command {
    name: "update",
    aliases: &["u", "upgrade"],
    description: "Activate a waiting cache generation",
  },
  Command {
    name: "notify",
    aliases: &["n", "push"],
    description: "Simulate a push message: notify <text>",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit ward-tracker",
  },
];

/// Split command line input into the command word and its arguments
pub fn split_args(input: &str) -> (&str, &str) {
  let input = input.trim();
  match input.split_once(char::is_whitespace) {
    Some((name, args)) => (name, args.trim()),
    None => (input, ""),
  }
}

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = split_args(input).0.to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    // Exact match on name
    if cmd.name == input_lower {
      matches.push((cmd, 0)); // Highest priority
      continue;
    }

    // Exact match on alias
    if cmd.aliases.contains(&input_lower.as_str()) {
      matches.push((cmd, 1));
      continue;
    }

    // Prefix match on name
    if cmd.name.starts_with(&input_lower) {
      matches.push((cmd, 2));
      continue;
    }

    // Prefix match on alias
    if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((cmd, 3));
      continue;
    }

    // Fuzzy match (contains)
    if cmd.name.contains(&input_lower) {
      matches.push((cmd, 4));
      continue;
    }

    // Fuzzy match on alias
    if cmd.aliases.iter().any(|a| a.contains(&input_lower)) {
      matches.push((cmd, 5));
    }
  }

  // Sort by priority
  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}
