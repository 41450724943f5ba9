//! 密码强度策略

/// 允许的特殊字符集合
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*()_+-=[]{};':\"\\|,.<>/?";

/// 常见弱密码（忽略大小写）
const COMMON_PASSWORDS: &[&str] = &["password", "12345678", "qwerty123", "admin123"];

const MIN_LENGTH: usize = 8;

/// 校验结果：按规则顺序列出所有不满足项
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasswordCheck {
    pub violations: Vec<String>,
}

impl PasswordCheck {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }
}

/// 无状态的密码强度校验器，所有规则都会执行，一次返回全部原因。
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordPolicy;

impl PasswordPolicy {
    pub fn validate(&self, password: &str) -> PasswordCheck {
        if password.is_empty() {
            return PasswordCheck {
                violations: vec!["Password is required.".to_string()],
            };
        }

        let mut violations = Vec::new();
        if password.chars().count() < MIN_LENGTH {
            violations.push(format!(
                "Password must be at least {MIN_LENGTH} characters long."
            ));
        }
        if !password.chars().any(char::is_uppercase) {
            violations.push("Password must contain at least one uppercase letter.".to_string());
        }
        if !password.chars().any(char::is_lowercase) {
            violations.push("Password must contain at least one lowercase letter.".to_string());
        }
        if !password.chars().any(|c| c.is_ascii_digit()) {
            violations.push("Password must contain at least one digit.".to_string());
        }
        if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
            violations.push("Password must contain at least one special character.".to_string());
        }
        let lowered = password.to_lowercase();
        if COMMON_PASSWORDS.contains(&lowered.as_str()) {
            violations.push("Password is too common.".to_string());
        }

        PasswordCheck { violations }
    }
}
