//! Localization: a fixed three-locale message catalog plus the persisted
//! per-user language preference.
//!
//! Every user-visible reply goes through [`text`]. Untranslated keys fall back
//! to English; the catalog below is complete for all three locales, but the
//! fallback keeps partial future additions safe.

use std::{collections::HashMap, sync::Mutex};

use serde::{Deserialize, Serialize};

use crate::{domain::UserId, store::JsonStore};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Ru,
    #[default]
    En,
    Az,
}

impl Lang {
    pub fn from_code(code: &str) -> Option<Lang> {
        match code {
            "ru" => Some(Lang::Ru),
            "en" => Some(Lang::En),
            "az" => Some(Lang::Az),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Lang::Ru => "ru",
            Lang::En => "en",
            Lang::Az => "az",
        }
    }
}

/// Keys for every localized reply the bot sends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    StartGreeting,
    HelpText,
    AccessActive,
    TrialActive,
    NoAccess,
    AdminOnly,
    NoSubscribers,
    NoPendingRequests,
    SubscriptionActive,
    SubscriptionInfo,
    SubscriptionActivated, // {days}
    SubscriptionRevoked,
    TrialActivated, // {minutes}
    TrialCooldown,  // {minutes}
    TrialStatus,    // {seconds}
    TrialGiven,     // {minutes}
    ProfileActive,  // {days} {keys}
    ProfileInactive, // {keys}
    GeneratingImage,
    TrialImageOnce,
    NoImageKeys,
    ImageFailed,
    ImageLink, // {url}
    UpstreamFailed,
    Processing,
    AnalyzingLink,
    LinkFailed,
    ReadingPdf,
    PdfError,
    ReadingTxt,
    UnsupportedFile,
    ThisIsTask,
    ThisIsReceipt,
    ChooseImageType,
    PhotoNotFound,
    ReceiptReceived,
    ReceiptAlreadySent,
    RequestRejected,
    SelectLanguage,
    LanguageSelected,
}

/// Look up a catalog entry. English is the fallback locale.
pub fn text(lang: Lang, key: Key) -> &'static str {
    lookup(lang, key).unwrap_or_else(|| lookup(Lang::En, key).unwrap_or(""))
}

fn lookup(lang: Lang, key: Key) -> Option<&'static str> {
    use Key::*;
    use Lang::*;

    Some(match (lang, key) {
        (Ru, StartGreeting) => "<b>🔥Привет!🔥</b>\n\n- Напиши /subscribe для доступа.\n- /trial для пробного доступа.\n- /profile для просмотра профиля.\n- /help для помощи.\n- /language для смены языка.",
        (En, StartGreeting) => "<b>🔥Hello!🔥</b>\n\n- Write /subscribe for access.\n- /trial for trial access.\n- /profile to check the profile.\n- /help for help.\n- /language to change language.",
        (Az, StartGreeting) => "<b>🔥Salam!🔥</b>\n\n- Giriş üçün /subscribe.\n- Sınaq girişi üçün /trial.\n- Profil üçün /profile.\n- Kömək üçün /help.\n- Dili dəyişmək üçün /language.",

        (Ru, HelpText) => "<b>🛠 Доступные команды:</b>\n/start — Начать работу с ботом\n/subscribe — Инструкция по оплате подписки\n/status — Узнать статус подписки\n/trial — Получить пробный доступ\n/language — Сменить язык интерфейса\n/help — Показать список всех команд\n\n<b>📌 Как пользоваться ботом:</b>\n— Отправь вопрос текстом 📝 — получишь ответ\n— Отправь ссылку 🔗 — бот проанализирует и решит тест\n— Отправь фото задания 📷 — бот распознает и решит\n— Отправь описание изображения 🌅 — получишь сгенерированное изображение\n\nℹ Чтобы сгенерировать изображение, используй ключевые слова: <i>сгенерируй &lt;описание&gt;</i> или <i>generate &lt;description&gt;</i>",
        (En, HelpText) => "<b>🛠 Available commands:</b>\n/start — Start working with the bot\n/subscribe — Payment subscription instructions\n/status — Check subscription status\n/trial — Get trial access\n/language — Change interface language\n/help — Show list of all commands\n\n<b>📌 How to use the bot:</b>\n— Send a text question 📝 — get an answer\n— Send a link 🔗 — the bot will analyze and solve the test\n— Send a photo of a task 📷 — the bot will recognize and solve it\n— Send an image description 🌅 — get a generated image\n\nℹ To generate an image, use keywords like: <i>generate &lt;your description&gt;</i>",
        (Az, HelpText) => "<b>🛠 Mövcud əmrlər:</b>\n/start — Bot ilə işə başlayın\n/subscribe — Abunəlik ödəniş təlimatları\n/status — Abunəlik statusunu yoxlayın\n/trial — Sınaq girişi əldə edin\n/language — İnterfeys dilini dəyişin\n/help — Bütün əmrlərin siyahısını göstərin\n\n<b>📌 Botdan necə istifadə etmək olar:</b>\n— Mətn sualı göndərin 📝 — cavab alın\n— Link göndərin 🔗 — bot təhlil edib testi həll edəcək\n— Tapşırığın şəklini göndərin 📷 — bot tanıyıb həll edəcək\n— Şəkil təsvirini göndərin 🌅 — yaradılmış şəkil alın\n\nℹ Şəkil yaratmaq üçün açar sözlər: <i>generate &lt;təsvir&gt;</i>",

        (Ru, AccessActive) => "✅ Доступ активен! Отправьте вопрос.",
        (En, AccessActive) => "✅ Access is active! Send your question.",
        (Az, AccessActive) => "✅ Giriş aktivdir! Sualınızı göndərin.",

        (Ru, TrialActive) => "🕒 Пробный доступ активен. Отправьте вопрос.",
        (En, TrialActive) => "🕒 Trial access is active. Send your question.",
        (Az, TrialActive) => "🕒 Sınaq girişi aktivdir. Sualınızı göndərin.",

        (Ru, NoAccess) => "🔒 Нет доступа. Напиши /subscribe или /trial.",
        (En, NoAccess) => "🔒 No access. Write /subscribe or /trial.",
        (Az, NoAccess) => "🔒 Giriş yoxdur. /subscribe və ya /trial.",

        (Ru, AdminOnly) => "⛔ Только для администратора.",
        (En, AdminOnly) => "⛔ Admin only.",
        (Az, AdminOnly) => "⛔ Yalnız administrator üçün.",

        (Ru, NoSubscribers) => "📭 Нет активных подписчиков.",
        (En, NoSubscribers) => "📭 No active subscribers.",
        (Az, NoSubscribers) => "📭 Aktiv abunəçi yoxdur.",

        (Ru, NoPendingRequests) => "📭 Нет ожидающих заявок.",
        (En, NoPendingRequests) => "📭 No pending requests.",
        (Az, NoPendingRequests) => "📭 Gözləyən müraciət yoxdur.",

        (Ru, SubscriptionActive) => "✅ Подписка уже активна!",
        (En, SubscriptionActive) => "✅ Subscription is already active!",
        (Az, SubscriptionActive) => "✅ Abunəlik artıq aktivdir!",

        (Ru, SubscriptionInfo) => "Подписка на 25 дней.\nОплати и отправь 📸 скрин чека.",
        (En, SubscriptionInfo) => "Subscription for 25 days.\nPay and send 📸 a screenshot of the receipt.",
        (Az, SubscriptionInfo) => "25 günlük abunəlik.\nÖdəyin və 📸 qəbzin şəklini göndərin.",

        (Ru, SubscriptionActivated) => "✅ Подписка активирована на {days} дней!",
        (En, SubscriptionActivated) => "✅ Subscription activated for {days} days!",
        (Az, SubscriptionActivated) => "✅ Abunəlik {days} günlük aktivləşdirildi!",

        (Ru, SubscriptionRevoked) => "❌ Ваша подписка была отключена администратором.",
        (En, SubscriptionRevoked) => "❌ Your subscription has been disabled by the administrator.",
        (Az, SubscriptionRevoked) => "❌ Abunəliyiniz administrator tərəfindən deaktiv edilib.",

        (Ru, TrialActivated) => "🎉 Пробный период активирован на {minutes} минут!",
        (En, TrialActivated) => "🎉 Trial period activated for {minutes} minutes!",
        (Az, TrialActivated) => "🎉 Sınaq müddəti {minutes} dəqiqə üçün aktivləşdirildi!",

        (Ru, TrialCooldown) => "⏳ Пробный доступ можно получить раз в 5 дней.\nОсталось подождать: {minutes} минут.",
        (En, TrialCooldown) => "⏳ Trial access can be obtained once every 5 days.\nTime left to wait: {minutes} minutes.",
        (Az, TrialCooldown) => "⏳ Sınaq girişi 5 gündə bir dəfə alına bilər.\nGözləmə vaxtı: {minutes} dəqiqə.",

        (Ru, TrialStatus) => "🕒 Пробный период активен. Осталось: {seconds} сек.",
        (En, TrialStatus) => "🕒 Trial period is active. Time left: {seconds} sec.",
        (Az, TrialStatus) => "🕒 Sınaq dövrü aktivdir. Qalan: {seconds} san.",

        (Ru, TrialGiven) => "🎉 Вам выдан пробный доступ на {minutes} минут!",
        (En, TrialGiven) => "🎉 You have been given trial access for {minutes} minutes!",
        (Az, TrialGiven) => "🎉 Sizə {minutes} dəqiqə sınaq girişi verildi!",

        (Ru, ProfileActive) => "👤 Ваш профиль:\n\n📅 Подписка активна. Осталось: {days} дн.\n🔑 Ключи для генерации: {keys}",
        (En, ProfileActive) => "👤 Your profile:\n\n📅 Subscription active. Remaining: {days} days\n🔑 Image generation keys: {keys}",
        (Az, ProfileActive) => "👤 Profiliniz:\n\n📅 Abunəlik aktivdir. Qalan: {days} gün\n🔑 Şəkil yaratmaq açarları: {keys}",

        (Ru, ProfileInactive) => "👤 Ваш профиль:\n\n❌ Подписка не активна.\n🔑 Доступные ключи (заморожены): {keys}\n\nЧтобы использовать ключи — оформите подписку.",
        (En, ProfileInactive) => "👤 Your profile:\n\n❌ Subscription not active.\n🔑 Available keys (frozen): {keys}\n\nSubscribe to use keys.",
        (Az, ProfileInactive) => "👤 Profiliniz:\n\n❌ Abunəlik aktiv deyil.\n🔑 Mövcud açarlar (dondurulub): {keys}\n\nAçarları istifadə etmək üçün abunə olun.",

        (Ru, GeneratingImage) => "🖼 Генерирую изображение, подождите...",
        (En, GeneratingImage) => "🖼 Generating image, please wait...",
        (Az, GeneratingImage) => "🖼 Şəkil yaradılır, gözləyin...",

        (Ru, TrialImageOnce) => "🚫 Во время пробного периода можно сгенерировать изображение только 1 раз.",
        (En, TrialImageOnce) => "🚫 During the trial period, you can generate an image only once.",
        (Az, TrialImageOnce) => "🚫 Sınaq müddətində yalnız bir dəfə şəkil yarada bilərsiniz.",

        (Ru, NoImageKeys) => "❌ У вас закончились ключи для генерации изображения. Дождитесь новой подписки.",
        (En, NoImageKeys) => "❌ You have run out of image generation keys. Please wait for a new subscription.",
        (Az, NoImageKeys) => "❌ Şəkil yaratmaq üçün açarlarınız qurtardı. Yeni abunəliyi gözləyin.",

        (Ru, ImageFailed) => "❌ Не удалось сгенерировать изображение.",
        (En, ImageFailed) => "❌ Failed to generate image.",
        (Az, ImageFailed) => "❌ Şəkli yaratmaq mümkün olmadı.",

        (Ru, ImageLink) => "🖼 Ссылка на изображение:\n{url}",
        (En, ImageLink) => "🖼 Image link:\n{url}",
        (Az, ImageLink) => "🖼 Şəkil linki:\n{url}",

        (Ru, UpstreamFailed) => "❌ Сервис временно недоступен. Попробуйте позже.",
        (En, UpstreamFailed) => "❌ The service is temporarily unavailable. Please try again later.",
        (Az, UpstreamFailed) => "❌ Xidmət müvəqqəti əlçatan deyil. Daha sonra yenidən cəhd edin.",

        (Ru, Processing) => "✍ Обрабатываю длинный текст, подождите немного...",
        (En, Processing) => "✍ Processing long text, please wait a bit...",
        (Az, Processing) => "✍ Uzun mətn emal olunur, bir az gözləyin...",

        (Ru, AnalyzingLink) => "🔍 Анализирую ссылку...",
        (En, AnalyzingLink) => "🔍 Analyzing the link...",
        (Az, AnalyzingLink) => "🔍 Link təhlil edilir...",

        (Ru, LinkFailed) => "❌ Не удалось загрузить страницу по ссылке.",
        (En, LinkFailed) => "❌ Could not load the page at that link.",
        (Az, LinkFailed) => "❌ Linkdəki səhifəni yükləmək mümkün olmadı.",

        (Ru, ReadingPdf) => "📄 Читаю PDF...",
        (En, ReadingPdf) => "📄 Reading PDF...",
        (Az, ReadingPdf) => "📄 PDF oxunur...",

        (Ru, PdfError) => "❌ Не удалось прочитать текст из PDF. Убедись, что это не скан.",
        (En, PdfError) => "❌ Unable to read text from PDF. Make sure it is not a scan.",
        (Az, PdfError) => "❌ PDF-dən mətni oxumaq mümkün deyil. Bunun skan olmadığına əmin olun.",

        (Ru, ReadingTxt) => "📄 Читаю файл и отвечаю на вопросы...",
        (En, ReadingTxt) => "📄 Reading the file and answering the questions...",
        (Az, ReadingTxt) => "📄 Faylı oxuyuram və suallara cavab verirəm...",

        (Ru, UnsupportedFile) => "⚠ Поддерживаются только файлы .pdf и .txt.",
        (En, UnsupportedFile) => "⚠ Only .pdf and .txt files are supported.",
        (Az, UnsupportedFile) => "⚠ Yalnız .pdf və .txt faylları dəstəklənir.",

        (Ru, ThisIsTask) => "📝 Это задание",
        (En, ThisIsTask) => "📝 This is a task",
        (Az, ThisIsTask) => "📝 Bu bir tapşırıqdır",

        (Ru, ThisIsReceipt) => "🧾 Это чек",
        (En, ThisIsReceipt) => "🧾 This is a receipt",
        (Az, ThisIsReceipt) => "🧾 Bu bir çekdir",

        (Ru, ChooseImageType) => "Выберите тип изображения:",
        (En, ChooseImageType) => "Choose image type:",
        (Az, ChooseImageType) => "Şəkil növünü seçin:",

        (Ru, PhotoNotFound) => "❌ Фото не найдено. Пожалуйста, отправьте заново.",
        (En, PhotoNotFound) => "❌ Photo not found. Please resend.",
        (Az, PhotoNotFound) => "❌ Şəkil tapılmadı. Zəhmət olmasa yenidən göndərin.",

        (Ru, ReceiptReceived) => "✅ Чек получен. Ожидайте одобрения.",
        (En, ReceiptReceived) => "✅ Receipt received. Wait for approval.",
        (Az, ReceiptReceived) => "✅ Qəbz alındı. Təsdiqi gözləyin.",

        (Ru, ReceiptAlreadySent) => "⚠ Вы уже отправляли чек. Ожидайте одобрения.",
        (En, ReceiptAlreadySent) => "⚠ You have already sent a receipt. Wait for approval.",
        (Az, ReceiptAlreadySent) => "⚠ Artıq qəbz göndərmisiniz. Təsdiqi gözləyin.",

        (Ru, RequestRejected) => "❌ Ваша заявка отклонена. Проверьте чек и попробуйте снова.",
        (En, RequestRejected) => "❌ Your request has been rejected. Check the receipt and try again.",
        (Az, RequestRejected) => "❌ Müraciətiniz rədd edildi. Qəbzi yoxlayın və yenidən cəhd edin.",

        (Ru, SelectLanguage) => "🌍 Выберите язык:",
        (En, SelectLanguage) => "🌍 Choose language:",
        (Az, SelectLanguage) => "🌍 Dil seçin:",

        (Ru, LanguageSelected) => "🌍 Выбран русский язык",
        (En, LanguageSelected) => "🌍 English language selected",
        (Az, LanguageSelected) => "🌍 Azərbaycan dili seçildi",
    })
}

/// Persisted user -> language mapping; defaults to English when absent.
pub struct LangPrefs {
    store: JsonStore,
    map: Mutex<HashMap<i64, Lang>>,
}

impl LangPrefs {
    pub fn new(store: JsonStore) -> Self {
        let map = store.load_or_default();
        Self {
            store,
            map: Mutex::new(map),
        }
    }

    pub fn get(&self, user: UserId) -> Lang {
        self.map
            .lock()
            .expect("lang prefs lock")
            .get(&user.0)
            .copied()
            .unwrap_or_default()
    }

    pub fn set(&self, user: UserId, lang: Lang) {
        let mut map = self.map.lock().expect("lang prefs lock");
        map.insert(user.0, lang);
        if let Err(e) = self.store.save(&*map) {
            tracing::error!("failed to persist language preferences: {e}");
        }
    }

    /// Localized reply for `user` in one call.
    pub fn text_for(&self, user: UserId, key: Key) -> &'static str {
        text(self.get(user), key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_language_is_english() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = LangPrefs::new(JsonStore::new(dir.path().join("languages.json")));
        assert_eq!(prefs.get(UserId(1)), Lang::En);
    }

    #[test]
    fn preference_persists_across_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("languages.json");

        {
            let prefs = LangPrefs::new(JsonStore::new(&path));
            prefs.set(UserId(7), Lang::Az);
        }
        let prefs = LangPrefs::new(JsonStore::new(&path));
        assert_eq!(prefs.get(UserId(7)), Lang::Az);
    }

    #[test]
    fn catalog_covers_all_locales_for_core_keys() {
        for lang in [Lang::Ru, Lang::En, Lang::Az] {
            assert!(!text(lang, Key::NoAccess).is_empty());
            assert!(!text(lang, Key::StartGreeting).is_empty());
            assert!(!text(lang, Key::ProfileActive).is_empty());
        }
    }

    #[test]
    fn lang_codes_round_trip() {
        for lang in [Lang::Ru, Lang::En, Lang::Az] {
            assert_eq!(Lang::from_code(lang.code()), Some(lang));
        }
        assert_eq!(Lang::from_code("de"), None);
    }
}
