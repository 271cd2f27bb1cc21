//! Per-industry canned greetings used by proactive engagement.
//!
//! Static greeting table per industry and page context (product, cart,
//! general), in English and Turkish. Product pages for a few industries get a
//! more specific line that references the page title.

use serde::{Deserialize, Serialize};

/// Tenant industry tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Industry {
    #[default]
    Ecommerce,
    Booking,
    RealEstate,
    Saas,
    Service,
    Healthcare,
    Education,
    Academic,
    Finance,
    Other,
}

/// Page context classification derived from the URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Product,
    Cart,
    General,
}

/// Greeting language. Only English and Turkish have per-industry texts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GreetingLang {
    En,
    Tr,
}

/// Static greeting for an industry and page context.
pub fn static_greeting(industry: Industry, kind: PageKind, lang: GreetingLang) -> &'static str {
    use GreetingLang::{En, Tr};
    use Industry::*;
    use PageKind::*;
    match (industry, kind, lang) {
        (Ecommerce, Product, En) => "👋 Hi! Are you interested in this product? I can help with discounts and features.",
        (Ecommerce, Product, Tr) => "👋 Merhaba! Bu ürünle ilgileniyor musunuz? İndirimler ve özellikler hakkında yardımcı olabilirim.",
        (Ecommerce, Cart, En) => "👋 Can I help you complete your purchase?",
        (Ecommerce, Cart, Tr) => "👋 Sepetinizdeki ürünleri tamamlamanıza yardımcı olayım mı?",
        (Ecommerce, General, En) => "👋 Welcome! I can help you find the perfect product for your needs.",
        (Ecommerce, General, Tr) => "👋 Hoş geldiniz! Size en uygun ürünü bulmanızda yardımcı olabilirim.",

        (Booking, Product, En) => "✈️ Planning a vacation? I can give you details about this booking option!",
        (Booking, Product, Tr) => "✈️ Tatil planı mı yapıyorsunuz? Bu rezervasyon seçeneği hakkında detaylı bilgi verebilirim!",
        (Booking, Cart, En) => "🎫 Need help completing your reservation? I can assist with the final steps.",
        (Booking, Cart, Tr) => "🎫 Rezervasyonunuzu tamamlamak için yardıma ihtiyacınız var mı? Son adımlarda size yardımcı olabilirim.",
        (Booking, General, En) => "👋 Hello! I can help plan your next trip. Flights, hotels, buses, or car rentals - what are you looking for?",
        (Booking, General, Tr) => "👋 Merhaba! Bir sonraki yolculuğunuzu planlamanıza yardımcı olabilirim. Uçak, otel, otobüs veya araç kiralama - ne arıyorsunuz?",

        (RealEstate, Product, En) => "👋 Interested in this property? I can provide more details about the location and price.",
        (RealEstate, Product, Tr) => "👋 Bu mülk hakkında detaylı bilgi almak ister misiniz? Randevu oluşturabilirim.",
        (RealEstate, Cart, En) => "📝 Ready to schedule a viewing or make an offer?",
        (RealEstate, Cart, Tr) => "👋 İlgilendiğiniz ilanları kaydettiniz mi?",
        (RealEstate, General, En) => "👋 Looking for your dream home? Be it rent or sale, I can help you find it.",
        (RealEstate, General, Tr) => "👋 Merhaba! Hayalinizdeki evi bulmanıza yardımcı olayım mı?",

        (Saas, Product, En) => "👋 Want to learn more about this software solution? I can explain its features.",
        (Saas, Product, Tr) => "👋 Bu özellik hakkında sorunuz var mı? Nasıl çalıştığını anlatabilirim.",
        (Saas, Cart, En) => "👋 Ready to subscribe or start a trial?",
        (Saas, Cart, Tr) => "👋 Plan seçimi konusunda kararsız mısınız?",
        (Saas, General, En) => "👋 Hello! How can I help you regarding our software solutions?",
        (Saas, General, Tr) => "👋 Merhaba! Yazılımımızla işlerinizi nasıl kolaylaştırabileceğinizi anlatabilirim.",

        (Service, Product, En) => "🔧 Need help with this service? I can explain the process.",
        (Service, Product, Tr) => "🔧 Bu hizmetle ilgili yardıma mı ihtiyacınız var? Süreci anlatabilirim.",
        (Service, Cart, En) => "📅 Shall we schedule an appointment for this service?",
        (Service, Cart, Tr) => "📅 Bu hizmet için bir randevu oluşturalım mı?",
        (Service, General, En) => "👋 Welcome! I can answer your questions about our services and help you make an appointment.",
        (Service, General, Tr) => "👋 Hoş geldiniz! Hizmetlerimizle ilgili sorularınızı cevaplayabilir ve randevu almanıza yardımcı olabilirim.",

        (Healthcare, Product, En) => "⚕️ Do you have questions about this treatment or doctor?",
        (Healthcare, Product, Tr) => "⚕️ Bu sağlık hizmetimizle ilgileniyor musunuz?",
        (Healthcare, Cart, En) => "📅 Shall we book an appointment?",
        (Healthcare, Cart, Tr) => "📅 Randevu oluşturmak ister misiniz?",
        (Healthcare, General, En) => "👋 Hello! I can help you with health services and appointments.",
        (Healthcare, General, Tr) => "👋 Merhaba! Sağlığınızla ilgili nasıl yardımcı olabilirim?",

        (Education, Product, En) => "🎓 Interested in this course? I can cover the curriculum and requirements.",
        (Education, Product, Tr) => "🎓 Bu eğitim hakkında bilgi almak ister misiniz?",
        (Education, Cart, En) => "📝 Help with registration?",
        (Education, Cart, Tr) => "📝 Kayıt olmak ister misiniz?",
        (Education, General, En) => "👋 Welcome! I can help you find the right training or course.",
        (Education, General, Tr) => "👋 Merhaba! Geleceğiniz için en iyi eğitimi bulmanıza yardımcı olayım.",

        (Academic, Product, En) => "🎓 Interested in this program? I can tell you about admission requirements and scholarships.",
        (Academic, Product, Tr) => "🎓 Bu program hakkında bilgi almak ister misiniz? Kabul koşulları ve burslar hakkında yardımcı olabilirim.",
        (Academic, Cart, En) => "📝 Ready to apply? I can guide you through the process.",
        (Academic, Cart, Tr) => "📝 Başvuru yapmaya hazır mısınız? Süreç boyunca size rehberlik edebilirim.",
        (Academic, General, En) => "👋 Welcome! I can help you explore our academic programs and campus life.",
        (Academic, General, Tr) => "👋 Hoş geldiniz! Akademik programlarımız ve kampüs yaşamı hakkında bilgi verebilirim.",

        (Finance, Product, En) => "💰 Interested in this financial product? I can provide more details.",
        (Finance, Product, Tr) => "💰 Bu finansal ürün hakkında detaylı bilgi verebilirim.",
        (Finance, Cart, En) => "📝 Ready to apply or learn more about the process?",
        (Finance, Cart, Tr) => "📝 Başvuru yapmak ister misiniz?",
        (Finance, General, En) => "👋 Hello! I can help you achieve your financial goals.",
        (Finance, General, Tr) => "👋 Merhaba! Finansal hedeflerinize ulaşmanızda yardımcı olabilirim.",

        (Other, Product, En) => "👋 Do you want more information about this?",
        (Other, Product, Tr) => "👋 Bu konuda daha fazla bilgi ister misiniz?",
        (Other, Cart, En) => "👋 Do you want to continue your transaction?",
        (Other, Cart, Tr) => "👋 İşleminize devam etmek ister misiniz?",
        (Other, General, En) => "👋 Hello! How can I help you?",
        (Other, General, Tr) => "👋 Merhaba! Size nasıl yardımcı olabilirim?",
    }
}

/// Product-page line referencing the page title. Only a few industries have
/// title-specific phrasing; others fall back to the static product greeting.
pub fn titled_product_greeting(
    industry: Industry,
    title: &str,
    lang: GreetingLang,
) -> Option<String> {
    use GreetingLang::{En, Tr};
    use Industry::*;
    let line = match (industry, lang) {
        (Ecommerce, En) => format!(
            "👋 Hi! Are you interested in \"{}\"? I can help with discounts and features.",
            title
        ),
        (Ecommerce, Tr) => format!(
            "👋 Merhaba! \"{}\" ile ilgileniyor musunuz? İndirimler ve özellikler hakkında yardımcı olabilirim.",
            title
        ),
        (Booking, En) => format!(
            "✈️ Planning a vacation? I can give you details about \"{}\"!",
            title
        ),
        (Booking, Tr) => format!(
            "✈️ Tatil planı mı yapıyorsunuz? \"{}\" hakkında detaylı bilgi verebilirim!",
            title
        ),
        (RealEstate, En) => format!(
            "👋 Interested in \"{}\"? I can provide more details about the location and price.",
            title
        ),
        (RealEstate, Tr) => format!(
            "👋 \"{}\" hakkında detaylı bilgi almak ister misiniz? Randevu oluşturabilirim.",
            title
        ),
        _ => return None,
    };
    Some(line)
}
