//! The fixed set of login steps and their page paths.

use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    EnterLoginName,
    EnterPassword,
    ChoosePasskey,
    ChooseMfa,
    EnterMfaCode,
    VerifyEmail,
    Register,
    Done,
}

impl Step {
    pub const ALL: [Step; 8] = [
        Step::EnterLoginName,
        Step::EnterPassword,
        Step::ChoosePasskey,
        Step::ChooseMfa,
        Step::EnterMfaCode,
        Step::VerifyEmail,
        Step::Register,
        Step::Done,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Step::EnterLoginName => "/loginname",
            Step::EnterPassword => "/password",
            Step::ChoosePasskey => "/passkey",
            Step::ChooseMfa => "/mfa",
            Step::EnterMfaCode => "/otp",
            Step::VerifyEmail => "/verify",
            Step::Register => "/register",
            Step::Done => "/signedin",
        }
    }

    pub fn from_path(path: &str) -> Option<Step> {
        let path = path.trim_end_matches('/');
        Step::ALL.into_iter().find(|s| s.path() == path)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::EnterLoginName => "enter_login_name",
            Step::EnterPassword => "enter_password",
            Step::ChoosePasskey => "choose_passkey",
            Step::ChooseMfa => "choose_mfa",
            Step::EnterMfaCode => "enter_mfa_code",
            Step::VerifyEmail => "verify_email",
            Step::Register => "register",
            Step::Done => "done",
        }
    }

    /// Position on the main chain (login name, credential, MFA, done).
    /// Side branches have none.
    pub fn rank(&self) -> Option<u8> {
        match self {
            Step::EnterLoginName => Some(0),
            Step::EnterPassword | Step::ChoosePasskey => Some(1),
            Step::ChooseMfa => Some(2),
            Step::EnterMfaCode => Some(3),
            Step::Done => Some(4),
            Step::VerifyEmail | Step::Register => None,
        }
    }
}

impl core::fmt::Display for Step {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_step_has_a_distinct_path() {
        for step in Step::ALL {
            assert_eq!(Step::from_path(step.path()), Some(step));
        }
        assert_eq!(Step::from_path("/password/"), Some(Step::EnterPassword));
        assert_eq!(Step::from_path("/nope"), None);
    }

    #[test]
    fn side_branches_are_unranked() {
        assert!(Step::VerifyEmail.rank().is_none());
        assert!(Step::Register.rank().is_none());
        assert!(Step::EnterLoginName.rank() < Step::Done.rank());
    }
}
