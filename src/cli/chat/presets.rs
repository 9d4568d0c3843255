/// Teams of the KBO league, in the order they are listed to the user.
pub const TEAMS: [&str; 10] = [
    "LG 트윈스", "두산 베어스", "SSG 랜더스", "한화 이글스",
    "KIA 타이거즈", "롯데 자이언츠", "삼성 라이온즈",
    "키움 히어로즈", "KT 위즈", "NC 다이노스",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Stadium,
    History,
    Championships,
}

impl Topic {
    /// Matches the chat command that asks about this topic.
    pub fn from_command(command: &str) -> Option<Self> {
        match command {
            "/stadium" => Some(Topic::Stadium),
            "/history" => Some(Topic::History),
            "/titles" => Some(Topic::Championships),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Topic::Stadium => "🏟️ 홈구장 정보",
            Topic::History => "📜 팀 역사",
            Topic::Championships => "🏆 주요 우승 기록",
        }
    }

    pub fn prompt(&self, team: &str) -> String {
        match self {
            Topic::Stadium => format!(
                "{}의 홈구장에 대해 설명해줘. 위치, 특징, 수용 인원 등을 포함해서 알려줘.",
                team
            ),
            Topic::History => format!(
                "{}의 역사와 전통에 대해 설명해줘. 창단 연도부터 주요 사건들을 알려줘.",
                team
            ),
            Topic::Championships => format!(
                "{}의 한국시리즈 우승 기록과 그 때의 주요 선수들에 대해 알려줘.",
                team
            ),
        }
    }
}

/// Looks a team up by its 1-based position in [`TEAMS`], or by name.
///
/// Names match case-insensitively, first on the full name and then on a
/// unique prefix, so `kia`, `KIA 타이거즈` and `5` all find the same team.
pub fn find_team(query: &str) -> Option<&'static str> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }

    if let Ok(index) = query.parse::<usize>() {
        return index.checked_sub(1).and_then(|i| TEAMS.get(i)).copied();
    }

    let query = query.to_lowercase();
    if let Some(team) = TEAMS.iter().find(|team| team.to_lowercase() == query) {
        return Some(*team);
    }

    let mut matches = TEAMS
        .iter()
        .copied()
        .filter(|team| team.to_lowercase().starts_with(&query));
    match (matches.next(), matches.next()) {
        (Some(team), None) => Some(team),
        _ => None,
    }
}
