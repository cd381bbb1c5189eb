//! Fixed text posted to channels and DMs.

use bulwark_types::models::Submission;
use bulwark_types::outbound::{channel_link, mention};

pub const SEPARATOR: &str = "──────────────────────";

pub const CODE_THREAD_TITLE: &str = "Code";

pub fn submission_intro(season: &str) -> String {
    format!(
        "@everyone\n\n\
         Defenses shared start here: 🧱-s{season}-eos-defenses\n\n\
         There's some good stuff here and it's great to see some new contributors with interesting ideas! 🫡\n\n\
         These are strictly for use last 25 minutes only.\n\n\
         Please add a 👍 or ✅ if you plan to use one and show your appreciation. ❤️"
    )
}

pub fn opponents_opening(season: &str) -> String {
    format!(
        "**SEASON {season} EOS DEFENSES**\n\n\
         These are some of the formations which people used end of season {season}. \
         Big thanks to those who shared these forms.\n\n\
         __Keep in mind to make some screenshots of the final day opponents defenses or record your \
         arena run and screenshot the defenses from there afterwards.__\n\n\
         You can discuss the formations in 🧱-eos-discussion. Every form has a number, so you can \
         easily refer to it.\n\n\
         **If you would like the form to be discussed and tested, please react with a \"👍\".**\n\n\
         If you are testing some of the season {season} posted defense forms, please copy the \
         **formation code** and add it under the picture as a **\"thread\"**. So people can easily \
         copy & paste it for their own use. Thank you! 🙂"
    )
}

pub fn opponents_closing() -> String {
    "**Please keep in mind to make some screenshots of the final day opponents defenses or record \
     your arena run and screenshot the defenses from there afterwards.**\n\n\
     **Starts here**: 🧱-eos-opponents-defenses"
        .to_string()
}

/// Main line of a published submission: mention, per-user ordinal when the
/// submitter has several items in the batch, extra mention, then the message.
pub fn submission_caption(sub: &Submission, ordinal: Option<usize>) -> String {
    let mut content = mention(&sub.user_id);
    if let Some(n) = ordinal {
        content.push_str(&format!(" - {}", n));
    }
    if let Some(extra) = &sub.extra_mention {
        content.push(' ');
        content.push_str(&mention(extra));
    }
    if let Some(message) = &sub.message {
        content.push_str("\n\n");
        content.push_str(message);
    }
    content
}

pub fn submission_published_ack(channel_id: &str) -> String {
    format!(
        "🎉 **Your defense has been published!**\n\n\
         🙏 Thank you for your contribution! Your defense is now live and helping the team!\n\n\
         🔗 Check it out in {}",
        channel_link(channel_id)
    )
}

pub fn opponent_published_ack(number: i64, channel_id: &str) -> String {
    format!(
        "🎉 **Opponent defense #{} has been published** in {}. Thank you for sharing it!",
        number,
        channel_link(channel_id)
    )
}

pub fn submission_receipt(id: i64, code: &str) -> String {
    let preview: String = code.chars().take(50).collect();
    let ellipsis = if code.chars().count() > 50 { "..." } else { "" };
    format!(
        "✅ **Submission received!** #{id}\n\n\
         🙏 Thank you for sharing your defense! Your contribution helps the team! 💪\n\n\
         📝 Code: `{preview}{ellipsis}`\n🖼️ Image: ✅"
    )
}

const HOW_TO_SUBMIT: &str = "⚠️ **Important:** You must send the image and code **together in the same message**.\n\n\
     📝 **How to submit:**\n\
     1. Attach your defense screenshot\n\
     2. Write your code in the message text\n\
     3. Send both together!";

pub fn missing_image() -> String {
    format!("❌ Please send an **image** with your **code**!\n\n{HOW_TO_SUBMIT}")
}

pub fn missing_code() -> String {
    format!("❌ Please send your **code** with the image!\n\n{HOW_TO_SUBMIT}")
}

pub fn submission_prompt() -> String {
    format!("🛡️ **Share a defense**\n\n{HOW_TO_SUBMIT}")
}

pub fn opponents_prompt() -> String {
    "⚔️ **EOS Opponents Defenses**\n\n\
     Send one or more screenshots of opponent defenses. You can send several messages.\n\
     Say **done** when you are finished, or **cancel** to stop."
        .to_string()
}

pub fn opponents_received(added: usize, total: usize) -> String {
    format!("📥 {added} image(s) received ({total} so far). Send more, or **done** to finish.")
}

pub fn opponents_finished(total: usize) -> String {
    format!("🙏 Thank you! {total} opponent defense image(s) submitted for review.")
}

pub fn opponents_need_image() -> String {
    "❌ Please attach at least one **image**, or say **done** to finish.".to_string()
}

pub fn nothing_in_progress() -> String {
    "ℹ️ Nothing in progress. Send your defense image together with its code.".to_string()
}

pub fn cancelled() -> String {
    "❌ Cancelled. Nothing else will be recorded.".to_string()
}

pub fn admin_notification(id: i64, user_id: &str, username: &str) -> String {
    format!(
        "📥 **New Submission Received!**\n🆔 {id} | 👤 {} | 📛 {username}\nUse the review queue to manage submissions.",
        mention(user_id)
    )
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn sub() -> Submission {
        Submission {
            id: 1,
            user_id: "111".into(),
            username: "alice".into(),
            code: "X".into(),
            message: None,
            extra_mention: None,
            image_data: None,
            image_filename: None,
            created_at: Utc::now(),
            published: false,
        }
    }

    #[test]
    fn caption_with_everything() {
        let mut s = sub();
        s.extra_mention = Some("222".into());
        s.message = Some("tank heavy".into());
        assert_eq!(submission_caption(&s, Some(2)), "<@111> - 2 <@222>\n\ntank heavy");
    }

    #[test]
    fn caption_plain() {
        assert_eq!(submission_caption(&sub(), None), "<@111>");
    }

    #[test]
    fn receipt_truncates_long_code() {
        let code = "A".repeat(60);
        let receipt = submission_receipt(9, &code);
        assert!(receipt.contains(&format!("`{}...`", "A".repeat(50))));
        assert!(submission_receipt(9, "short").contains("`short`"));
    }

    #[test]
    fn intro_names_the_season() {
        assert!(submission_intro("159").contains("s159-eos-defenses"));
        assert!(opponents_opening("159").contains("SEASON 159"));
    }
}
