use crate::limits::package::PackageId;

/// What the presentation layer shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    /// Offer to set a passcode; none exists yet
    PasscodeSettings,
    /// A passcode exists; offer to change it
    PasscodeDecision,
    AppDashboard,
    /// Interstitial for an app over its limit
    Blocking(PackageId),
}

impl Screen {
    /// Where to go once apps have been selected
    pub fn after_selection(has_passcode: bool) -> Screen {
        if has_passcode {
            Screen::PasscodeDecision
        } else {
            Screen::PasscodeSettings
        }
    }

    /// The screen to show given the blocked package; a block always wins
    pub fn resolve(&self, blocked: Option<&PackageId>) -> Screen {
        match blocked {
            Some(package) => Screen::Blocking(package.clone()),
            None => match self {
                Screen::Blocking(_) => Screen::AppDashboard,
                other => other.clone(),
            },
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Screen::PasscodeSettings => "Set passcode",
            Screen::PasscodeDecision => "Passcode",
            Screen::AppDashboard => "Dashboard",
            Screen::Blocking(_) => "Time limit reached",
        }
    }
}
