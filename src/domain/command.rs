//! Chat command vocabulary. Maps the start of a private message to a `Command`.
//!
//! Matching is case-insensitive, ignores surrounding whitespace and treats
//! hyphens and spaces alike, so `List-Birthdays` and `list birthdays` are the
//! same command. The rest of the message is the command body.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Ping,
    Help,
    ListBirthdays,
    SendBirthdayReminder,
    CreateChallenge,
    AwardWinner,
    SendWinnerMessage,
    QuestReminders,
    PartyNewsletter,
    OwnedQuests,
    CountUnusedQuestions,
    AddQuestion,
    AddTask,
    ListInactiveMembers,
    GemBalance,
}

/// Who may run a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Anyone,
    /// Party members and the administrator.
    PartyMember,
    Admin,
}

/// Canonical name first, then accepted aliases. Names are written with spaces.
const VOCABULARY: &[(Command, &[&str])] = &[
    (Command::Ping, &["ping"]),
    (Command::Help, &["help"]),
    (Command::ListBirthdays, &["list birthdays"]),
    (Command::SendBirthdayReminder, &["send birthday reminder"]),
    (
        Command::CreateChallenge,
        &["create next sharing weekend", "create challenge"],
    ),
    (Command::AwardWinner, &["award latest winner", "award winner"]),
    (Command::SendWinnerMessage, &["send winner message"]),
    (
        Command::QuestReminders,
        &["quest reminders", "send quest reminder", "send quest reminders"],
    ),
    (
        Command::PartyNewsletter,
        &["party newsletter", "forward newsletter"],
    ),
    (Command::OwnedQuests, &["owned quests"]),
    (Command::CountUnusedQuestions, &["count unused questions"]),
    (Command::AddQuestion, &["add new question"]),
    (Command::AddTask, &["add task"]),
    (Command::ListInactiveMembers, &["list inactive members"]),
    (Command::GemBalance, &["gem balance"]),
];

impl Command {
    pub fn all() -> impl Iterator<Item = Command> {
        VOCABULARY.iter().map(|(c, _)| *c)
    }

    /// Canonical spelling used in help texts, e.g. `quest-reminders`.
    pub fn name(self) -> String {
        VOCABULARY
            .iter()
            .find(|(c, _)| *c == self)
            .map(|(_, names)| names[0].replace(' ', "-"))
            .unwrap_or_default()
    }

    pub fn permission(self) -> Permission {
        match self {
            Command::Ping
            | Command::Help
            | Command::ListBirthdays
            | Command::SendWinnerMessage
            | Command::CountUnusedQuestions
            | Command::GemBalance => Permission::Anyone,
            Command::QuestReminders
            | Command::PartyNewsletter
            | Command::OwnedQuests
            | Command::ListInactiveMembers => Permission::PartyMember,
            Command::SendBirthdayReminder
            | Command::CreateChallenge
            | Command::AwardWinner
            | Command::AddQuestion
            | Command::AddTask => Permission::Admin,
        }
    }

    /// Commands that read the member table and want it fresh first.
    pub fn needs_member_sync(self) -> bool {
        matches!(
            self,
            Command::QuestReminders
                | Command::PartyNewsletter
                | Command::ListInactiveMembers
                | Command::OwnedQuests
        )
    }

    pub fn help(self) -> &'static str {
        match self {
            Command::Ping => "Does nothing but sends a response.",
            Command::Help => "List the available commands.",
            Command::ListBirthdays => {
                "List party members who are celebrating their birthday today."
            }
            Command::SendBirthdayReminder => {
                "Send today's birthday reminder now. Members already reminded about today are skipped."
            }
            Command::CreateChallenge => {
                "Create a new sharing weekend challenge. No customization is currently available: \
                 the challenge is created with default parameters to the party the bot is currently in."
            }
            Command::AwardWinner => {
                "Award a randomly drawn winner for the newest sharing weekend challenge whose \
                 weekend is not still ahead."
            }
            Command::SendWinnerMessage => {
                "List participants for the sharing weekend challenge to award and declare a winner \
                 from amongst them. The draw is seeded, so repeating it gives the same winner."
            }
            Command::QuestReminders => {
                "Send out quest reminders to the people in the given quest queue. The queue must be \
                 given inside a code block with each quest on its own line: the name of the quest, \
                 a semicolon (;) and a comma-separated list of quest owner login names, e.g. \
                 `Unicorn; @SomePartyMember, OtherGuy`. The leading @ is optional. Reminders \
                 are sent for all except the first quest, \
                 whose name only tells the next owners after which quest to send their invite."
            }
            Command::PartyNewsletter => {
                "Send an identical message to all party members. Everything after the command \
                 is the newsletter."
            }
            Command::OwnedQuests => {
                "List all quests someone in party owns and the names of the owners."
            }
            Command::CountUnusedQuestions => {
                "Report the number of unused sharing weekend questions."
            }
            Command::AddQuestion => {
                "Add a sharing weekend question. The first line after the command is the question, \
                 the rest is its description."
            }
            Command::AddTask => {
                "Add a new task for the bot: `add-task [task_type]: [task name]` followed by an \
                 optional description on the next lines."
            }
            Command::ListInactiveMembers => {
                "List party members who have not logged in for a long time."
            }
            Command::GemBalance => "Reports the number of gems currently in the bot's wallet",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Result of matching a message against the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed<'a> {
    Known { command: Command, body: &'a str },
    /// First word of an unrecognized message (empty for blank messages).
    Unknown { word: &'a str },
}

/// Whitespace-separated tokens of `text` with their byte ranges.
fn token_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, ch) in text.char_indices() {
        match (ch.is_whitespace(), start) {
            (true, Some(s)) => {
                spans.push((s, i));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}

/// Lowercased words of a token, hyphen-separated parts counting as words.
fn token_words(token: &str) -> Vec<String> {
    token
        .split('-')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Match the leading words of `content` against the vocabulary.
///
/// The longest matching alias wins and a match must end on a token boundary,
/// so `pingpong` is unknown while `ping pong` is `Ping` with body `pong`.
pub fn parse(content: &str) -> Parsed<'_> {
    let text = content.trim();
    let spans = token_spans(text);

    let mut words: Vec<String> = Vec::new();
    // (number of words so far, end byte of token) at each token boundary
    let mut boundaries: Vec<(usize, usize)> = Vec::new();
    for &(s, e) in spans.iter().take(6) {
        words.extend(token_words(&text[s..e]));
        boundaries.push((words.len(), e));
    }

    let mut best: Option<(usize, Command, usize)> = None;
    for (command, aliases) in VOCABULARY {
        for alias in aliases.iter() {
            let alias_words: Vec<&str> = alias.split(' ').collect();
            let n = alias_words.len();
            let Some(&(_, end)) = boundaries.iter().find(|(count, _)| *count == n) else {
                continue;
            };
            let matches = words[..n].iter().zip(&alias_words).all(|(a, b)| a == b);
            if matches && best.is_none_or(|(len, _, _)| n > len) {
                best = Some((n, *command, end));
            }
        }
    }

    match best {
        Some((_, command, end)) => Parsed::Known {
            command,
            body: text[end..].trim(),
        },
        None => Parsed::Unknown {
            word: spans.first().map(|&(s, e)| &text[s..e]).unwrap_or(""),
        },
    }
}
