use std::sync::OnceLock;
use tera::{Context, Tera};

use crate::mailer::EmailTemplate;

static TERA: OnceLock<Tera> = OnceLock::new();

const EMAIL_TEMPLATES: &[(&str, &str)] = &[
    (
        "membership_lapse.txt",
        include_str!("../templates/email/membership_lapse.txt"),
    ),
    (
        "invitation_reminder.txt",
        include_str!("../templates/email/invitation_reminder.txt"),
    ),
    (
        "submission_reminder.txt",
        include_str!("../templates/email/submission_reminder.txt"),
    ),
    (
        "review_reminder.txt",
        include_str!("../templates/email/review_reminder.txt"),
    ),
];

pub fn get_tera() -> &'static Tera {
    TERA.get_or_init(|| {
        let mut tera = Tera::default();
        tera.add_raw_templates(EMAIL_TEMPLATES.iter().copied())
            .expect("Failed to load email templates");
        tera
    })
}

pub fn render_email(template: EmailTemplate, ctx: &Context) -> tera::Result<String> {
    get_tera().render(template.file_name(), ctx)
}
